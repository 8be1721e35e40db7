use crate::common::{session, Reply};
use gdbprobe::probe::mi::types::StopReason;
use gdbprobe::Error;
use serial_test::serial;
use std::cell::RefCell;
use std::sync::Arc;

#[test]
fn test_nth_result_answers_nth_command() {
    let (mut session, sent) = session(vec![
        Reply::Line("1^done"),
        Reply::Line("(gdb)"),
        Reply::Line("2^done"),
        Reply::Line("(gdb)"),
        Reply::Line("3^done"),
        Reply::Line("(gdb)"),
    ]);

    session.gdb_set("confirm", "off").unwrap();
    session.gdb_set("height", "0").unwrap();
    session.gdb_set("width", "0").unwrap();

    assert_eq!(
        *sent.borrow(),
        vec![
            "1-gdb-set confirm off",
            "2-gdb-set height 0",
            "3-gdb-set width 0",
        ]
    );
}

#[test]
fn test_mismatched_token_aborts_command() {
    let replies = (1..=6)
        .flat_map(|token| {
            [
                Reply::Line(match token {
                    1 => "1^done",
                    2 => "2^done",
                    3 => "3^done",
                    4 => "4^done",
                    5 => "5^done",
                    _ => "6^done",
                }),
                Reply::Line("(gdb)"),
            ]
        })
        .chain([Reply::Line("8^done"), Reply::Line("(gdb)")])
        .collect();
    let (mut session, _) = session(replies);

    for _ in 0..6 {
        session.gdb_set("confirm", "off").unwrap();
    }
    let err = session.gdb_set("confirm", "off").unwrap_err();
    match err {
        Error::MismatchedToken { expected, got } => {
            assert_eq!(expected, 7);
            assert_eq!(got, 8);
        }
        other => panic!("mismatched token expected, got {other:?}"),
    }
    assert!(err.is_fatal());
}

#[test]
fn test_notifications_fan_out_during_wait() {
    let (mut session, _) = session(vec![
        Reply::Line("=thread-created,id=\"2\",group-id=\"i1\""),
        Reply::Line("=thread-created,id=\"3\",group-id=\"i1\""),
        Reply::Line("*stopped,reason=\"end-stepping-range\",thread-id=\"2\""),
    ]);

    let created: Arc<RefCell<Vec<String>>> = Arc::default();
    let sink = created.clone();
    session.on_notification(Some("thread-created".to_string()), move |record| {
        let id = record.fields.find("id").unwrap().expect_str().unwrap();
        sink.borrow_mut().push(id.to_string());
    });

    let stop = session.wait_for_stop().unwrap();
    assert_eq!(stop.reason, Some(StopReason::EndSteppingRange));
    assert_eq!(*created.borrow(), vec!["2", "3"]);
}

#[test]
#[serial]
fn test_log_gate_silences_engine() {
    assert!(gdbprobe::log::is_enabled());
    gdbprobe::log::disable();
    assert!(!gdbprobe::log::is_enabled());

    // engine operations run fine with logging muted
    let (mut session, _) = session(vec![Reply::Line("1^done"), Reply::Line("(gdb)")]);
    session.gdb_set("confirm", "off").unwrap();

    gdbprobe::log::enable();
    assert!(gdbprobe::log::is_enabled());
}
