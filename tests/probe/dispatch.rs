use crate::common::{session, Reply, TestBreakPoint};
use gdbprobe::probe::breakpoint::BreakpointRegistry;
use gdbprobe::probe::config::ProbeConfig;
use gdbprobe::probe::frame::Var;
use gdbprobe::{Error, Probe};

const BANNER: [Reply; 4] = [
    Reply::Line("=thread-group-added,id=\"i1\""),
    Reply::Line("~\"GNU gdb (GDB) 12.1\\n\""),
    Reply::Line("~\"This GDB was configured as \\\"x86_64-linux-gnu\\\".\\n\""),
    Reply::Line("(gdb)"),
];

#[test]
fn test_full_dispatch_run() {
    let mut replies = BANNER.to_vec();
    replies.extend([
        // breakpoint installation, one insert per registered handler
        Reply::Line(
            "1^done,bkpt={number=\"1\",type=\"breakpoint\",disp=\"keep\",enabled=\"y\",\
             addr=\"0x08048564\",func=\"main\",file=\"myprog.c\",\
             fullname=\"/home/user/myprog.c\",line=\"68\",thread-groups=[\"i1\"],times=\"0\"}",
        ),
        Reply::Line("(gdb)"),
        Reply::Line(
            "2^done,bkpt={number=\"2\",type=\"breakpoint\",disp=\"keep\",enabled=\"y\",\
             addr=\"<MULTIPLE>\"},{number=\"2.1\",enabled=\"y\",addr=\"0x08049000\",\
             func=\"compute\",file=\"calc.c\",line=\"10\"},{number=\"2.2\",enabled=\"y\",\
             addr=\"0x08049100\",func=\"compute\",file=\"calc.c\",line=\"20\"}",
        ),
        Reply::Line("(gdb)"),
        Reply::Line("3^error,msg=\"Function \\\"missing_fn\\\" not defined.\""),
        Reply::Line("(gdb)"),
        // run
        Reply::Line("4^running"),
        Reply::Line("(gdb)"),
        // first stop: main
        Reply::Line("=library-loaded,id=\"/lib/libc.so.6\""),
        Reply::Line(
            "*stopped,reason=\"breakpoint-hit\",disp=\"keep\",bkptno=\"1\",thread-id=\"1\",\
             stopped-threads=\"all\",frame={addr=\"0x08048564\",func=\"main\",args=[],\
             file=\"myprog.c\",fullname=\"/home/user/myprog.c\",line=\"68\"}",
        ),
        // argument-name resolution for main
        Reply::Line("5^done,stack-args=[frame={level=\"0\",args=[name=\"argc\",name=\"argv\"]}]"),
        Reply::Line("(gdb)"),
        // the handler prints a variable
        Reply::Line("6^done,value=\"1\""),
        Reply::Line("(gdb)"),
        // resume
        Reply::Line("7^running"),
        Reply::Line("(gdb)"),
        // second stop: compute (multiple-location breakpoint, major number 2)
        Reply::Line(
            "*stopped,reason=\"breakpoint-hit\",disp=\"keep\",bkptno=\"2\",thread-id=\"1\",\
             stopped-threads=\"all\",frame={addr=\"0x08049000\",func=\"compute\",args=[],\
             file=\"calc.c\",line=\"10\"}",
        ),
        // argument-name resolution for compute
        Reply::Line("8^done,stack-args=[frame={level=\"0\",args=[name=\"x\"]}]"),
        Reply::Line("(gdb)"),
        // the handler disables its own breakpoint, then requests completion
        Reply::Line("9^done"),
        Reply::Line("(gdb)"),
        // shutdown
        Reply::Line("10^exit"),
    ]);
    let (session, sent) = session(replies);

    let main_handler = TestBreakPoint::new("main").on_hit(|frame| {
        assert_eq!(frame.print("argc")?, Var::Number(1));
        Ok(())
    });
    let main_info = main_handler.info.clone();
    let compute_handler = TestBreakPoint::new("compute")
        .with_condition("x > 0")
        .disable_on_hit()
        .exit_on_hit();
    let compute_info = compute_handler.info.clone();
    let missing_handler = TestBreakPoint::new("missing_fn");
    let missing_info = missing_handler.info.clone();

    let mut registry = BreakpointRegistry::default();
    registry.add(Box::new(main_handler));
    registry.add(Box::new(compute_handler));
    registry.add(Box::new(missing_handler));

    let mut probe = Probe::new(session, None, registry, ProbeConfig::default());
    let exit_code = probe.run().unwrap();
    assert_eq!(exit_code, 0);

    let banner = probe.banner().unwrap();
    assert_eq!(banner.version.as_deref(), Some("12.1"));
    assert_eq!(banner.configuration.as_deref(), Some("x86_64-linux-gnu"));

    assert_eq!(main_info.hits.get(), 1);
    assert_eq!(main_info.file.borrow().as_deref(), Some("myprog.c"));
    assert_eq!(main_info.line.get(), Some(68));
    assert_eq!(*main_info.arguments.borrow(), vec!["argc", "argv"]);
    assert_eq!(
        *main_info.set_at.borrow(),
        Some((Some(0x08048564), Some("myprog.c".to_string()), Some(68)))
    );

    assert_eq!(compute_info.hits.get(), 1);
    assert_eq!(
        *compute_info.set_multiple.borrow(),
        Some((Some(0x08049000), "compute".to_string(), 2))
    );
    assert_eq!(*compute_info.arguments.borrow(), vec!["x"]);

    assert!(missing_info.not_found.get());
    assert_eq!(missing_info.hits.get(), 0);

    assert_eq!(
        *sent.borrow(),
        vec![
            "1-break-insert main",
            "2-break-insert -c \"x > 0\" -- compute",
            "3-break-insert missing_fn",
            "4-exec-run",
            "5-stack-list-arguments --no-values 0 0",
            "6-data-evaluate-expression argc",
            "7-exec-continue",
            "8-stack-list-arguments --no-values 0 0",
            "9-break-disable 2",
            "10-gdb-exit",
        ]
    );
}

#[test]
fn test_unhandled_stop_reason_resumes() {
    let mut replies = vec![Reply::Line("(gdb)")];
    replies.extend([
        Reply::Line("1^running"),
        Reply::Line("(gdb)"),
        Reply::Line("*stopped,reason=\"end-stepping-range\",thread-id=\"1\""),
        Reply::Line("2^running"),
        Reply::Line("(gdb)"),
        Reply::Line("*stopped,reason=\"exited\",exit-code=\"02\""),
        Reply::Line("3^exit"),
    ]);
    let (session, sent) = session(replies);

    let mut probe = Probe::new(
        session,
        None,
        BreakpointRegistry::default(),
        ProbeConfig::default(),
    );
    assert_eq!(probe.run().unwrap(), 2);
    assert_eq!(
        *sent.borrow(),
        vec!["1-exec-run", "2-exec-continue", "3-gdb-exit"]
    );
}

#[test]
fn test_handler_error_terminates_run() {
    let mut replies = vec![Reply::Line("(gdb)")];
    replies.extend([
        Reply::Line("1^done,bkpt={number=\"1\",enabled=\"y\"}"),
        Reply::Line("(gdb)"),
        Reply::Line("2^running"),
        Reply::Line("(gdb)"),
        Reply::Line("*stopped,reason=\"breakpoint-hit\",bkptno=\"1\",thread-id=\"1\""),
        Reply::Line("3^exit"),
    ]);
    let (session, _) = session(replies);

    let failing = TestBreakPoint::new("main").on_hit(|_| Err(anyhow::anyhow!("assertion failed")));
    let mut registry = BreakpointRegistry::default();
    registry.add(Box::new(failing));

    let mut probe = Probe::new(session, None, registry, ProbeConfig::default());
    let err = probe.run().unwrap_err();
    match err {
        Error::Hook(inner) => assert!(inner.to_string().contains("assertion failed")),
        other => panic!("hook error expected, got {other:?}"),
    }
}

#[test]
fn test_watchdog_aborts_run() {
    let replies = vec![Reply::Line("(gdb)"), Reply::Timeout];
    let (session, sent) = session(replies);

    let mut probe = Probe::new(
        session,
        None,
        BreakpointRegistry::default(),
        ProbeConfig::default(),
    );
    let err = probe.run().unwrap_err();
    assert!(matches!(err, Error::WatchdogTimeout(_)));
    assert!(err.is_fatal());
    // a desynchronized session gets no farewell command
    assert!(!sent.borrow().iter().any(|line| line.contains("gdb-exit")));
}

#[test]
fn test_remote_target_continues_instead_of_running() {
    let mut replies = vec![Reply::Line("(gdb)")];
    replies.extend([
        // target-select
        Reply::Line("1^connected,addr=\"0x00000100\",func=\"_start\""),
        Reply::Line("(gdb)"),
        // init command through the console interpreter
        Reply::Line("~\"resetting target\\n\""),
        Reply::Line("2^done"),
        Reply::Line("(gdb)"),
        Reply::Line("3^running"),
        Reply::Line("(gdb)"),
        Reply::Line("*stopped,reason=\"exited-normally\""),
        Reply::Line("4^exit"),
    ]);
    let (session, sent) = session(replies);

    let config = ProbeConfig {
        remote: Some("localhost:3333".to_string()),
        init_commands: vec!["monitor reset halt".to_string()],
        ..Default::default()
    };
    let mut probe = Probe::new(session, None, BreakpointRegistry::default(), config);
    assert_eq!(probe.run().unwrap(), 0);
    assert_eq!(
        *sent.borrow(),
        vec![
            "1-target-select remote localhost:3333",
            "2-interpreter-exec console \"monitor reset halt\"",
            "3-exec-continue",
            "4-gdb-exit",
        ]
    );
}
