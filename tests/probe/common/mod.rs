use gdbprobe::probe::breakpoint::BreakPoint;
use gdbprobe::probe::frame::Frame;
use gdbprobe::probe::mi::transport::Transport;
use gdbprobe::probe::mi::Interpreter;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// One scripted answer of the fake debugger.
#[derive(Debug, Clone)]
pub enum Reply {
    Line(&'static str),
    Timeout,
}

/// Transport fed from a fixed script; every sent command line is recorded.
pub struct ScriptedTransport {
    replies: VecDeque<Reply>,
    pub sent: Arc<RefCell<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            sent: Arc::default(),
        }
    }
}

impl Transport for ScriptedTransport {
    fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.sent.borrow_mut().push(line.to_string());
        Ok(())
    }

    fn recv_line(&mut self) -> io::Result<String> {
        match self.replies.pop_front() {
            Some(Reply::Line(line)) => Ok(line.to_string()),
            Some(Reply::Timeout) => Err(io::ErrorKind::TimedOut.into()),
            None => Err(io::ErrorKind::UnexpectedEof.into()),
        }
    }
}

pub fn session(replies: Vec<Reply>) -> (Interpreter, Arc<RefCell<Vec<String>>>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let transport = ScriptedTransport::new(replies);
    let sent = transport.sent.clone();
    (
        Interpreter::new(Box::new(transport), Duration::from_secs(5)),
        sent,
    )
}

/// Capture slots shared between a test and its handler.
#[derive(Clone, Default)]
pub struct HitInfo {
    pub hits: Arc<Cell<u32>>,
    pub file: Arc<RefCell<Option<String>>>,
    pub line: Arc<Cell<Option<u64>>>,
    pub arguments: Arc<RefCell<Vec<String>>>,
    pub set_at: Arc<RefCell<Option<(Option<u64>, Option<String>, Option<u64>)>>>,
    pub set_multiple: Arc<RefCell<Option<(Option<u64>, String, usize)>>>,
    pub not_found: Arc<Cell<bool>>,
}

type HitAction = dyn Fn(&mut Frame<'_>) -> anyhow::Result<()>;

pub struct TestBreakPoint {
    identifier: String,
    condition: Option<String>,
    disable_on_hit: bool,
    exit_on_hit: bool,
    pub info: HitInfo,
    on_hit: Box<HitAction>,
}

impl TestBreakPoint {
    pub fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            condition: None,
            disable_on_hit: false,
            exit_on_hit: false,
            info: HitInfo::default(),
            on_hit: Box::new(|_| Ok(())),
        }
    }

    pub fn with_condition(mut self, condition: &str) -> Self {
        self.condition = Some(condition.to_string());
        self
    }

    /// Disable the own breakpoint from inside the handler.
    pub fn disable_on_hit(mut self) -> Self {
        self.disable_on_hit = true;
        self
    }

    /// Signal run completion from inside the handler.
    pub fn exit_on_hit(mut self) -> Self {
        self.exit_on_hit = true;
        self
    }

    pub fn on_hit(mut self, action: impl Fn(&mut Frame<'_>) -> anyhow::Result<()> + 'static) -> Self {
        self.on_hit = Box::new(action);
        self
    }
}

impl BreakPoint for TestBreakPoint {
    fn identifier(&self) -> String {
        self.identifier.clone()
    }

    fn condition(&self) -> Option<String> {
        self.condition.clone()
    }

    fn invoke(
        &self,
        frame: &mut Frame<'_>,
        file: Option<&str>,
        line: Option<u64>,
    ) -> anyhow::Result<()> {
        self.info.hits.set(self.info.hits.get() + 1);
        *self.info.file.borrow_mut() = file.map(ToString::to_string);
        self.info.line.set(line);
        *self.info.arguments.borrow_mut() = frame.arguments().to_vec();
        if self.disable_on_hit {
            frame.disable(self)?;
        }
        (self.on_hit)(frame)?;
        if self.exit_on_hit {
            frame.request_exit();
        }
        Ok(())
    }

    fn set_at(&self, addr: Option<u64>, file: Option<&str>, line: Option<u64>) {
        *self.info.set_at.borrow_mut() = Some((addr, file.map(ToString::to_string), line));
    }

    fn set_multiple(&self, addr: Option<u64>, name: &str, count: usize) {
        *self.info.set_multiple.borrow_mut() = Some((addr, name.to_string(), count));
    }

    fn set_not_found(&self) {
        self.info.not_found.set(true);
    }
}
