//! MI2 session: the token-correlated command/response/notification engine.
//!
//! The [`Interpreter`] owns the duplex byte stream to the debugger. Every
//! outgoing command gets the next token of a strictly increasing counter and
//! blocks until the result record bearing that token arrives; stream records
//! and async notifications interleaved with the reply are routed on the way.
//! The protocol is not pipelined here: at most one command is outstanding,
//! which `&mut self` on every operation enforces at compile time.

mod grammar;

pub mod command;
pub mod output;
pub mod transport;
pub mod types;
pub mod value;

use crate::gp_debug;
use crate::probe::error::Error;
use crate::probe::mi::command::MiCommand;
use crate::probe::mi::output::{
    parse_line, AsyncKind, AsyncOutput, Output, ResultClass, ResultOutput, StreamChannel,
    StreamRecord,
};
use crate::probe::mi::types::{
    Breakpoint, BreakpointTable, ConnectInfo, Disassembly, DownloadProgress, DownloadSummary,
    EvalResult, FeatureList, FrameArgs, FrameDescription, FromMi, LocalVariable, LocalVariables,
    MemoryRead, RegisterNames, RegisterValues, SourceFileInfo, Stack, StackArgs, StackDepth,
    StopEvent, ThreadInfo, ThreadSelection, TraceStatus, VarChanges, VarChildren, VarObj,
    Watchpoint,
};
use crate::probe::mi::value::Fields;
use std::io;
use std::time::Duration;
use strum_macros::Display;
use transport::Transport;

pub type Token = u64;

/// How much of variable values an enumeration request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PrintValues {
    #[strum(serialize = "--no-values")]
    No,
    #[strum(serialize = "--all-values")]
    All,
    #[strum(serialize = "--simple-values")]
    Simple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    Write,
    Read,
    Access,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DisassembleMode {
    #[strum(serialize = "0")]
    Plain,
    #[strum(serialize = "1")]
    Mixed,
}

/// Options of a breakpoint insertion.
#[derive(Debug, Clone, Default)]
pub struct BreakOptions {
    pub temporary: bool,
    pub hardware: bool,
    pub pending: bool,
    pub disabled: bool,
    pub condition: Option<String>,
    pub ignore_count: Option<u64>,
    pub thread: Option<u32>,
}

struct Listener {
    class: Option<String>,
    callback: Box<dyn FnMut(&AsyncOutput)>,
}

pub struct Interpreter {
    transport: Box<dyn Transport>,
    next_token: Token,
    timeout: Duration,
    stream_hook: Option<Box<dyn FnMut(&StreamRecord)>>,
    listeners: Vec<Listener>,
    console_capture: Option<String>,
}

impl Interpreter {
    pub fn new(transport: Box<dyn Transport>, timeout: Duration) -> Self {
        Self {
            transport,
            next_token: 0,
            timeout,
            stream_hook: None,
            listeners: vec![],
            console_capture: None,
        }
    }

    /// Register a sink for stream records. Records are logged either way,
    /// the hook receives them in addition.
    pub fn set_stream_hook(&mut self, hook: impl FnMut(&StreamRecord) + 'static) {
        self.stream_hook = Some(Box::new(hook));
    }

    /// Register a callback for async notifications. `class == None`
    /// subscribes to every class.
    pub fn on_notification(
        &mut self,
        class: Option<String>,
        callback: impl FnMut(&AsyncOutput) + 'static,
    ) {
        self.listeners.push(Listener {
            class,
            callback: Box::new(callback),
        });
    }

    fn allocate_token(&mut self) -> Token {
        self.next_token += 1;
        self.next_token
    }

    fn recv_output(&mut self) -> Result<Output, Error> {
        let line = self.transport.recv_line().map_err(|e| match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                Error::WatchdogTimeout(self.timeout)
            }
            io::ErrorKind::UnexpectedEof => Error::StreamClosed,
            _ => Error::IO(e),
        })?;
        gp_debug!(target: "probe", "<- {line}");
        Ok(parse_line(&line)?)
    }

    fn sink_stream(&mut self, record: &StreamRecord) {
        let text = record.text.trim_end_matches('\n');
        match record.channel {
            StreamChannel::Console => {
                gp_debug!(target: "gdb-console", "{text}");
                if let Some(capture) = self.console_capture.as_mut() {
                    capture.push_str(&record.text);
                }
            }
            StreamChannel::Log => gp_debug!(target: "gdb-log", "{text}"),
            StreamChannel::Target => gp_debug!(target: "gdb-target", "{text}"),
        }
        if let Some(hook) = self.stream_hook.as_mut() {
            hook(record);
        }
    }

    /// Route one async record.
    ///
    /// Tokened records are first offered to the pending observer of the
    /// outstanding command; exec-kind records are state broadcasts (the
    /// token attributes them to the command that started the run) and fan
    /// out either way; any other tokened record nobody waits for violates
    /// the correlation invariant.
    fn dispatch_async(
        &mut self,
        record: AsyncOutput,
        pending: Option<(Token, &mut dyn FnMut(&AsyncOutput) -> bool)>,
    ) -> Result<(), Error> {
        if let Some(token) = record.token {
            let claimed = match pending {
                Some((current, observer)) if current == token => observer(&record),
                _ => false,
            };
            if claimed {
                return Ok(());
            }
            if record.kind != AsyncKind::Exec {
                return Err(Error::UnexpectedAsyncRecord {
                    class: record.class,
                    token,
                });
            }
        }
        self.notify_listeners(&record);
        Ok(())
    }

    fn notify_listeners(&mut self, record: &AsyncOutput) {
        for listener in self.listeners.iter_mut() {
            let interested = listener
                .class
                .as_deref()
                .map_or(true, |class| class == record.class);
            if interested {
                (listener.callback)(record);
            }
        }
    }

    /// One command round-trip: write the line, read until the prompt that
    /// follows our result record. A read armed with the watchdog timeout
    /// bounds every blocking step.
    fn round_trip(
        &mut self,
        command: &MiCommand,
        mut observer: Option<&mut dyn FnMut(&AsyncOutput) -> bool>,
    ) -> Result<ResultOutput, Error> {
        let token = self.allocate_token();
        let line = command.render(token);
        gp_debug!(target: "probe", "-> {line}");
        self.transport.send_line(&line)?;

        let mut result: Option<ResultOutput> = None;
        loop {
            match self.recv_output()? {
                Output::Prompt => {
                    if let Some(result) = result.take() {
                        return Ok(result);
                    }
                }
                Output::Stream(record) => self.sink_stream(&record),
                Output::Async(record) => {
                    let pending = observer
                        .as_mut()
                        .map(|o| (token, &mut **o as &mut dyn FnMut(&AsyncOutput) -> bool));
                    self.dispatch_async(record, pending)?;
                }
                Output::Result(record) => match record.token {
                    Some(t) if t == token => {
                        if record.class == ResultClass::Exit {
                            // the debugger quits right away, no trailing prompt
                            return Ok(record);
                        }
                        result = Some(record);
                    }
                    Some(t) => {
                        return Err(Error::MismatchedToken {
                            expected: token,
                            got: t,
                        })
                    }
                    None => return Err(Error::UntaggedResult(token)),
                },
            }
        }
    }

    fn expect_class(&self, result: ResultOutput, expected: ResultClass) -> Result<Fields, Error> {
        match result.class {
            ResultClass::Error => {
                let msg = result
                    .fields
                    .find_opt("msg")
                    .and_then(|v| v.expect_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let code = result
                    .fields
                    .find_opt("code")
                    .and_then(|v| v.expect_str().ok())
                    .map(ToString::to_string);
                Err(Error::Gdb { msg, code })
            }
            class if class == expected => Ok(result.fields),
            class => Err(Error::UnexpectedResultClass {
                expected,
                got: class,
            }),
        }
    }

    fn execute(&mut self, command: MiCommand) -> Result<Fields, Error> {
        let result = self.round_trip(&command, None)?;
        self.expect_class(result, ResultClass::Done)
    }

    fn execute_running(&mut self, command: MiCommand) -> Result<(), Error> {
        let result = self.round_trip(&command, None)?;
        self.expect_class(result, ResultClass::Running)?;
        Ok(())
    }

    /// Read records until the first prompt, collecting console text.
    /// Used once per session for the startup banner.
    pub fn read_banner(&mut self) -> Result<String, Error> {
        self.console_capture = Some(String::new());
        let banner = loop {
            match self.recv_output() {
                Ok(Output::Prompt) => break Ok(self.console_capture.take().unwrap_or_default()),
                Ok(Output::Stream(record)) => self.sink_stream(&record),
                Ok(Output::Async(record)) => {
                    if let Err(e) = self.dispatch_async(record, None) {
                        break Err(e);
                    }
                }
                Ok(Output::Result(record)) => {
                    break Err(Error::UnexpectedRecord(record.to_string()))
                }
                Err(e) => break Err(e),
            }
        };
        self.console_capture = None;
        banner
    }

    /// Pure wait for the next `*stopped` event; no command is sent and the
    /// command slot stays free.
    pub fn wait_for_stop(&mut self) -> Result<StopEvent, Error> {
        loop {
            match self.recv_output()? {
                Output::Prompt => {}
                Output::Stream(record) => self.sink_stream(&record),
                Output::Async(record) => {
                    if record.kind == AsyncKind::Exec && record.class == "stopped" {
                        return StopEvent::from_mi(&record.fields);
                    }
                    self.dispatch_async(record, None)?;
                }
                Output::Result(record) => {
                    return Err(Error::UnexpectedRecord(record.to_string()))
                }
            }
        }
    }

    // --------------------------------- breakpoints -----------------------------------------------

    /// Insert a breakpoint at `location` (function name, `file:line` or
    /// `*address`). A location matching several overloads yields several
    /// records.
    pub fn break_insert(
        &mut self,
        location: &str,
        options: &BreakOptions,
    ) -> Result<Vec<Breakpoint>, Error> {
        let mut command = MiCommand::new("break-insert");
        if options.temporary {
            command = command.opt("-t");
        }
        if options.hardware {
            command = command.opt("-h");
        }
        if options.pending {
            command = command.opt("-f");
        }
        if options.disabled {
            command = command.opt("-d");
        }
        if let Some(condition) = options.condition.as_deref() {
            command = command.opt_with("-c", condition);
        }
        if let Some(count) = options.ignore_count {
            command = command.opt_with("-i", count);
        }
        if let Some(thread) = options.thread {
            command = command.opt_with("-p", thread);
        }

        let fields = self.execute(command.param(location))?;
        let breakpoints = fields
            .find_all("bkpt")
            .map(|v| Breakpoint::from_mi(&v.expect_tuple()?.0))
            .collect::<Result<Vec<_>, _>>()?;
        if breakpoints.is_empty() {
            return Err(Error::MissingField("bkpt"));
        }
        Ok(breakpoints)
    }

    pub fn break_watch(&mut self, expression: &str, kind: WatchKind) -> Result<Watchpoint, Error> {
        let (command, field) = match kind {
            WatchKind::Write => (MiCommand::new("break-watch"), "wpt"),
            WatchKind::Read => (MiCommand::new("break-watch").opt("-r"), "hw-rwpt"),
            WatchKind::Access => (MiCommand::new("break-watch").opt("-a"), "hw-awpt"),
        };
        let fields = self.execute(command.param(expression))?;
        Watchpoint::from_mi(&fields.find(field)?.expect_tuple()?.0)
    }

    pub fn break_delete(&mut self, numbers: &[u32]) -> Result<(), Error> {
        self.execute(MiCommand::new("break-delete").params(numbers))?;
        Ok(())
    }

    pub fn break_enable(&mut self, numbers: &[u32]) -> Result<(), Error> {
        self.execute(MiCommand::new("break-enable").params(numbers))?;
        Ok(())
    }

    pub fn break_disable(&mut self, numbers: &[u32]) -> Result<(), Error> {
        self.execute(MiCommand::new("break-disable").params(numbers))?;
        Ok(())
    }

    pub fn break_condition(&mut self, number: u32, expression: &str) -> Result<(), Error> {
        self.execute(
            MiCommand::new("break-condition")
                .param(number)
                .param(expression),
        )?;
        Ok(())
    }

    /// Ignore the next `count` hits.
    pub fn break_after(&mut self, number: u32, count: u64) -> Result<(), Error> {
        self.execute(MiCommand::new("break-after").param(number).param(count))?;
        Ok(())
    }

    pub fn break_list(&mut self) -> Result<BreakpointTable, Error> {
        let fields = self.execute(MiCommand::new("break-list"))?;
        BreakpointTable::from_mi(&fields)
    }

    // --------------------------------- execution -------------------------------------------------

    pub fn exec_run(&mut self) -> Result<(), Error> {
        self.execute_running(MiCommand::new("exec-run"))
    }

    pub fn exec_continue(&mut self) -> Result<(), Error> {
        self.execute_running(MiCommand::new("exec-continue"))
    }

    pub fn exec_next(&mut self) -> Result<(), Error> {
        self.execute_running(MiCommand::new("exec-next"))
    }

    pub fn exec_step(&mut self) -> Result<(), Error> {
        self.execute_running(MiCommand::new("exec-step"))
    }

    pub fn exec_next_instruction(&mut self) -> Result<(), Error> {
        self.execute_running(MiCommand::new("exec-next-instruction"))
    }

    pub fn exec_step_instruction(&mut self) -> Result<(), Error> {
        self.execute_running(MiCommand::new("exec-step-instruction"))
    }

    pub fn exec_finish(&mut self) -> Result<(), Error> {
        self.execute_running(MiCommand::new("exec-finish"))
    }

    pub fn exec_until(&mut self, location: Option<&str>) -> Result<(), Error> {
        let mut command = MiCommand::new("exec-until");
        if let Some(location) = location {
            command = command.param(location);
        }
        self.execute_running(command)
    }

    pub fn exec_jump(&mut self, location: &str) -> Result<(), Error> {
        self.execute_running(MiCommand::new("exec-jump").param(location))
    }

    /// Pop the current frame without executing it. The target stays stopped,
    /// the new current frame is returned.
    pub fn exec_return(&mut self) -> Result<Option<FrameDescription>, Error> {
        let fields = self.execute(MiCommand::new("exec-return"))?;
        match fields.find_opt("frame") {
            Some(value) => Ok(Some(FrameDescription::from_mi(&value.expect_tuple()?.0)?)),
            None => Ok(None),
        }
    }

    /// Ask the debugger to interrupt the running target. The stop itself
    /// arrives as a regular `*stopped` event.
    pub fn exec_interrupt(&mut self) -> Result<(), Error> {
        self.execute(MiCommand::new("exec-interrupt"))?;
        Ok(())
    }

    // --------------------------------- stack -----------------------------------------------------

    pub fn stack_list_frames(
        &mut self,
        bounds: Option<(u32, u32)>,
    ) -> Result<Vec<FrameDescription>, Error> {
        let mut command = MiCommand::new("stack-list-frames");
        if let Some((low, high)) = bounds {
            command = command.param(low).param(high);
        }
        let fields = self.execute(command)?;
        Ok(Stack::from_mi(&fields)?.frames)
    }

    pub fn stack_info_depth(&mut self, max_depth: Option<u32>) -> Result<u32, Error> {
        let mut command = MiCommand::new("stack-info-depth");
        if let Some(max_depth) = max_depth {
            command = command.param(max_depth);
        }
        let fields = self.execute(command)?;
        Ok(StackDepth::from_mi(&fields)?.0)
    }

    pub fn stack_select_frame(&mut self, level: u32) -> Result<(), Error> {
        self.execute(MiCommand::new("stack-select-frame").param(level))?;
        Ok(())
    }

    pub fn stack_info_frame(&mut self) -> Result<FrameDescription, Error> {
        let fields = self.execute(MiCommand::new("stack-info-frame"))?;
        FrameDescription::from_mi(&fields.find("frame")?.expect_tuple()?.0)
    }

    pub fn stack_list_arguments(
        &mut self,
        values: PrintValues,
        bounds: Option<(u32, u32)>,
    ) -> Result<Vec<FrameArgs>, Error> {
        let mut command = MiCommand::new("stack-list-arguments").param(values);
        if let Some((low, high)) = bounds {
            command = command.param(low).param(high);
        }
        let fields = self.execute(command)?;
        Ok(StackArgs::from_mi(&fields)?.frames)
    }

    pub fn stack_list_variables(
        &mut self,
        values: PrintValues,
    ) -> Result<Vec<LocalVariable>, Error> {
        let fields = self.execute(MiCommand::new("stack-list-variables").param(values))?;
        Ok(LocalVariables::from_mi(&fields)?.variables)
    }

    // --------------------------------- data ------------------------------------------------------

    pub fn data_evaluate_expression(&mut self, expression: &str) -> Result<String, Error> {
        let fields = self.execute(MiCommand::new("data-evaluate-expression").param(expression))?;
        Ok(EvalResult::from_mi(&fields)?.value)
    }

    pub fn data_read_memory_bytes(&mut self, addr: u64, count: u64) -> Result<MemoryRead, Error> {
        let fields = self.execute(
            MiCommand::new("data-read-memory-bytes")
                .param(format!("{addr:#x}"))
                .param(count),
        )?;
        MemoryRead::from_mi(&fields)
    }

    pub fn data_write_memory_bytes(&mut self, addr: u64, bytes: &[u8]) -> Result<(), Error> {
        let contents: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        self.execute(
            MiCommand::new("data-write-memory-bytes")
                .param(format!("{addr:#x}"))
                .param(contents),
        )?;
        Ok(())
    }

    pub fn data_list_register_names(&mut self) -> Result<RegisterNames, Error> {
        let fields = self.execute(MiCommand::new("data-list-register-names"))?;
        RegisterNames::from_mi(&fields)
    }

    /// Fetch register values in hex; an empty `numbers` slice fetches all.
    pub fn data_list_register_values(
        &mut self,
        numbers: &[u32],
    ) -> Result<RegisterValues, Error> {
        let fields = self.execute(
            MiCommand::new("data-list-register-values")
                .param("x")
                .params(numbers),
        )?;
        RegisterValues::from_mi(&fields)
    }

    pub fn data_disassemble(
        &mut self,
        start: u64,
        end: u64,
        mode: DisassembleMode,
    ) -> Result<Disassembly, Error> {
        let fields = self.execute(
            MiCommand::new("data-disassemble")
                .opt_with("-s", format!("{start:#x}"))
                .opt_with("-e", format!("{end:#x}"))
                .param(mode),
        )?;
        Disassembly::from_mi(&fields)
    }

    // --------------------------------- variable objects ------------------------------------------

    /// Create a variable object for `expression`. `name == None` lets the
    /// debugger pick one, the frame is the currently selected one.
    pub fn var_create(&mut self, name: Option<&str>, expression: &str) -> Result<VarObj, Error> {
        let fields = self.execute(
            MiCommand::new("var-create")
                .param(name.unwrap_or("-"))
                .param("*")
                .param(expression),
        )?;
        VarObj::from_mi(&fields)
    }

    pub fn var_delete(&mut self, name: &str) -> Result<(), Error> {
        self.execute(MiCommand::new("var-delete").param(name))?;
        Ok(())
    }

    pub fn var_assign(&mut self, name: &str, value: &str) -> Result<String, Error> {
        let fields = self.execute(MiCommand::new("var-assign").param(name).param(value))?;
        Ok(EvalResult::from_mi(&fields)?.value)
    }

    /// Update all variable objects (`name == None`) or a single one.
    pub fn var_update(&mut self, name: Option<&str>) -> Result<VarChanges, Error> {
        let fields = self.execute(
            MiCommand::new("var-update")
                .param("--all-values")
                .param(name.unwrap_or("*")),
        )?;
        VarChanges::from_mi(&fields)
    }

    pub fn var_list_children(
        &mut self,
        name: &str,
        values: PrintValues,
    ) -> Result<VarChildren, Error> {
        let fields = self.execute(
            MiCommand::new("var-list-children")
                .param(values)
                .param(name),
        )?;
        VarChildren::from_mi(&fields)
    }

    // --------------------------------- threads ---------------------------------------------------

    pub fn thread_info(&mut self, id: Option<u32>) -> Result<ThreadInfo, Error> {
        let mut command = MiCommand::new("thread-info");
        if let Some(id) = id {
            command = command.param(id);
        }
        let fields = self.execute(command)?;
        ThreadInfo::from_mi(&fields)
    }

    pub fn thread_select(&mut self, id: u32) -> Result<ThreadSelection, Error> {
        let fields = self.execute(MiCommand::new("thread-select").param(id))?;
        ThreadSelection::from_mi(&fields)
    }

    // --------------------------------- target ----------------------------------------------------

    /// Attach to a target; answers with the `connected` class.
    pub fn target_select(&mut self, kind: &str, parameters: &[&str]) -> Result<ConnectInfo, Error> {
        let command = MiCommand::new("target-select").param(kind).params(parameters);
        let result = self.round_trip(&command, None)?;
        let fields = self.expect_class(result, ResultClass::Connected)?;
        ConnectInfo::from_mi(&fields)
    }

    /// Load the executable onto the target. Progress records answering this
    /// command are claimed by `progress` before any general listener sees
    /// them.
    pub fn target_download(
        &mut self,
        mut progress: impl FnMut(DownloadProgress),
    ) -> Result<DownloadSummary, Error> {
        let mut claim = |record: &AsyncOutput| {
            if record.class != "download" {
                return false;
            }
            match DownloadProgress::from_mi(&record.fields) {
                Ok(update) => {
                    progress(update);
                    true
                }
                Err(_) => false,
            }
        };
        let command = MiCommand::new("target-download");
        let result = self.round_trip(&command, Some(&mut claim))?;
        let fields = self.expect_class(result, ResultClass::Done)?;
        DownloadSummary::from_mi(&fields)
    }

    pub fn target_disconnect(&mut self) -> Result<(), Error> {
        self.execute(MiCommand::new("target-disconnect"))?;
        Ok(())
    }

    // --------------------------------- files -----------------------------------------------------

    pub fn file_exec_and_symbols(&mut self, path: &str) -> Result<(), Error> {
        self.execute(MiCommand::new("file-exec-and-symbols").param(path))?;
        Ok(())
    }

    pub fn file_list_exec_source_file(&mut self) -> Result<SourceFileInfo, Error> {
        let fields = self.execute(MiCommand::new("file-list-exec-source-file"))?;
        SourceFileInfo::from_mi(&fields)
    }

    // --------------------------------- tracing ---------------------------------------------------

    pub fn trace_start(&mut self) -> Result<(), Error> {
        self.execute(MiCommand::new("trace-start"))?;
        Ok(())
    }

    pub fn trace_stop(&mut self) -> Result<(), Error> {
        self.execute(MiCommand::new("trace-stop"))?;
        Ok(())
    }

    pub fn trace_status(&mut self) -> Result<TraceStatus, Error> {
        let fields = self.execute(MiCommand::new("trace-status"))?;
        TraceStatus::from_mi(&fields)
    }

    // --------------------------------- miscellany ------------------------------------------------

    pub fn gdb_set(&mut self, variable: &str, value: &str) -> Result<(), Error> {
        self.execute(MiCommand::new("gdb-set").param(variable).param(value))?;
        Ok(())
    }

    pub fn gdb_show(&mut self, variable: &str) -> Result<String, Error> {
        let fields = self.execute(MiCommand::new("gdb-show").param(variable))?;
        Ok(EvalResult::from_mi(&fields)?.value)
    }

    pub fn gdb_exit(&mut self) -> Result<(), Error> {
        let result = self.round_trip(&MiCommand::new("gdb-exit"), None)?;
        self.expect_class(result, ResultClass::Exit)?;
        Ok(())
    }

    pub fn list_features(&mut self) -> Result<FeatureList, Error> {
        let fields = self.execute(MiCommand::new("list-features"))?;
        FeatureList::from_mi(&fields)
    }

    /// Run a CLI command through the console interpreter and return the
    /// console text it produced.
    pub fn interpreter_exec_console(&mut self, cli_command: &str) -> Result<String, Error> {
        self.console_capture = Some(String::new());
        let result = self
            .execute(
                MiCommand::new("interpreter-exec")
                    .param("console")
                    .param(cli_command),
            )
            .map(|_| self.console_capture.take().unwrap_or_default());
        self.console_capture = None;
        result
    }
}

#[cfg(test)]
mod test {
    use super::transport::mock::{Reply, ScriptedTransport};
    use super::*;
    use crate::probe::mi::types::{BreakpointAddress, StopReason};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn interpreter(replies: Vec<Reply>) -> (Interpreter, Rc<RefCell<Vec<String>>>) {
        let transport = ScriptedTransport::new(replies);
        let sent = transport.sent.clone();
        (
            Interpreter::new(Box::new(transport), Duration::from_secs(10)),
            sent,
        )
    }

    #[test]
    fn test_tokens_are_strictly_increasing() {
        let (mut session, sent) = interpreter(vec![
            Reply::Line("1^done"),
            Reply::Line("(gdb)"),
            Reply::Line("2^done"),
            Reply::Line("(gdb)"),
        ]);
        session.gdb_set("confirm", "off").unwrap();
        session.gdb_set("width", "0").unwrap();
        assert_eq!(
            *sent.borrow(),
            vec!["1-gdb-set confirm off", "2-gdb-set width 0"]
        );
    }

    #[test]
    fn test_mismatched_token_is_detected() {
        let (mut session, _) = interpreter(vec![Reply::Line("8^done"), Reply::Line("(gdb)")]);
        let err = session.gdb_set("confirm", "off").unwrap_err();
        match err {
            Error::MismatchedToken { expected, got } => {
                assert_eq!(expected, 1);
                assert_eq!(got, 8);
            }
            other => panic!("mismatched token expected, got {other:?}"),
        }
    }

    #[test]
    fn test_untagged_result_is_detected() {
        let (mut session, _) = interpreter(vec![Reply::Line("^done"), Reply::Line("(gdb)")]);
        assert!(matches!(
            session.gdb_set("confirm", "off").unwrap_err(),
            Error::UntaggedResult(1)
        ));
    }

    #[test]
    fn test_gdb_error_is_typed() {
        let (mut session, _) = interpreter(vec![
            Reply::Line("1^error,msg=\"No symbol \\\"foo\\\" in current context.\""),
            Reply::Line("(gdb)"),
        ]);
        let err = session.data_evaluate_expression("foo").unwrap_err();
        match err {
            Error::Gdb { msg, code } => {
                assert_eq!(msg, "No symbol \"foo\" in current context.");
                assert_eq!(code, None);
            }
            other => panic!("gdb error expected, got {other:?}"),
        }
    }

    #[test]
    fn test_unexpected_result_class() {
        let (mut session, _) = interpreter(vec![Reply::Line("1^running"), Reply::Line("(gdb)")]);
        let err = session.gdb_set("confirm", "off").unwrap_err();
        match err {
            Error::UnexpectedResultClass { expected, got } => {
                assert_eq!(expected, ResultClass::Done);
                assert_eq!(got, ResultClass::Running);
            }
            other => panic!("unexpected class error expected, got {other:?}"),
        }
    }

    #[test]
    fn test_exec_run_expects_running() {
        let (mut session, sent) =
            interpreter(vec![Reply::Line("1^running"), Reply::Line("(gdb)")]);
        session.exec_run().unwrap();
        assert_eq!(*sent.borrow(), vec!["1-exec-run"]);
    }

    #[test]
    fn test_break_insert_projects_breakpoint() {
        let (mut session, sent) = interpreter(vec![
            Reply::Line(
                "1^done,bkpt={number=\"1\",type=\"breakpoint\",disp=\"keep\",enabled=\"y\",\
                 addr=\"0x08048564\",func=\"main\",file=\"myprog.c\",line=\"68\",\
                 thread-groups=[\"i1\"],times=\"0\"}",
            ),
            Reply::Line("(gdb)"),
        ]);
        let breakpoints = session
            .break_insert(
                "main",
                &BreakOptions {
                    condition: Some("argc > 1".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(
            *sent.borrow(),
            vec!["1-break-insert -c \"argc > 1\" -- main"]
        );
        assert_eq!(breakpoints.len(), 1);
        assert_eq!(breakpoints[0].number.major, 1);
        assert_eq!(breakpoints[0].addr, Some(BreakpointAddress::At(0x08048564)));
    }

    #[test]
    fn test_break_insert_multiple_locations() {
        let (mut session, _) = interpreter(vec![
            Reply::Line(
                "1^done,bkpt={number=\"1\",enabled=\"y\",addr=\"<MULTIPLE>\"},\
                 {number=\"1.1\",enabled=\"y\",addr=\"0x1000\"},\
                 {number=\"1.2\",enabled=\"y\",addr=\"0x2000\"}",
            ),
            Reply::Line("(gdb)"),
        ]);
        let breakpoints = session
            .break_insert("overloaded", &BreakOptions::default())
            .unwrap();
        assert_eq!(breakpoints.len(), 3);
        assert_eq!(breakpoints[0].addr, Some(BreakpointAddress::Multiple));
        assert_eq!(breakpoints[2].number.minor, Some(2));
    }

    #[test]
    fn test_round_trip_routes_interleaved_records() {
        let console: Rc<RefCell<Vec<String>>> = Rc::default();
        let notifications: Rc<RefCell<Vec<String>>> = Rc::default();

        let (mut session, _) = interpreter(vec![
            Reply::Line("~\"Reading symbols...\\n\""),
            Reply::Line("=thread-group-added,id=\"i1\""),
            Reply::Line("1^done"),
            Reply::Line("(gdb)"),
        ]);
        let sink = console.clone();
        session.set_stream_hook(move |record| sink.borrow_mut().push(record.text.clone()));
        let sink = notifications.clone();
        session.on_notification(Some("thread-group-added".to_string()), move |record| {
            sink.borrow_mut().push(record.class.clone())
        });

        session.gdb_set("confirm", "off").unwrap();
        assert_eq!(*console.borrow(), vec!["Reading symbols...\n"]);
        assert_eq!(*notifications.borrow(), vec!["thread-group-added"]);
    }

    #[test]
    fn test_tokened_async_nobody_waits_for() {
        let (mut session, _) = interpreter(vec![
            Reply::Line("7+download,section=\".text\""),
            Reply::Line("1^done"),
            Reply::Line("(gdb)"),
        ]);
        let err = session.gdb_set("confirm", "off").unwrap_err();
        match err {
            Error::UnexpectedAsyncRecord { class, token } => {
                assert_eq!(class, "download");
                assert_eq!(token, 7);
            }
            other => panic!("unexpected async record error expected, got {other:?}"),
        }
    }

    #[test]
    fn test_download_progress_is_claimed() {
        let (mut session, _) = interpreter(vec![
            Reply::Line("1+download,section=\".text\",total-sent=\"512\",total-size=\"1024\""),
            Reply::Line("1+download,section=\".text\",total-sent=\"1024\",total-size=\"1024\""),
            Reply::Line("1^done,address=\"0x1000\",load-size=\"1024\",transfer-rate=\"8192\",write-rate=\"512\""),
            Reply::Line("(gdb)"),
        ]);
        let mut updates = vec![];
        let summary = session
            .target_download(|progress| updates.push(progress.total_sent.unwrap()))
            .unwrap();
        assert_eq!(updates, vec![512, 1024]);
        assert_eq!(summary.load_size, Some(1024));
    }

    #[test]
    fn test_wait_for_stop() {
        let (mut session, sent) = interpreter(vec![
            Reply::Line("~\"some console noise\\n\""),
            Reply::Line("=library-loaded,id=\"/lib/ld.so\""),
            Reply::Line("(gdb)"),
            Reply::Line(
                "*stopped,reason=\"breakpoint-hit\",bkptno=\"2\",thread-id=\"1\",\
                 frame={addr=\"0x08048564\",func=\"main\",file=\"myprog.c\",line=\"68\"}",
            ),
        ]);
        let stop = session.wait_for_stop().unwrap();
        assert_eq!(stop.reason, Some(StopReason::BreakpointHit));
        assert_eq!(stop.bkptno.unwrap().major, 2);
        // a pure wait sends nothing
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn test_wait_for_stop_rejects_result_record() {
        let (mut session, _) = interpreter(vec![Reply::Line("3^done")]);
        assert!(matches!(
            session.wait_for_stop().unwrap_err(),
            Error::UnexpectedRecord(_)
        ));
    }

    #[test]
    fn test_watchdog_timeout_surfaces() {
        let (mut session, _) = interpreter(vec![Reply::Timeout]);
        assert!(matches!(
            session.gdb_set("confirm", "off").unwrap_err(),
            Error::WatchdogTimeout(_)
        ));
    }

    #[test]
    fn test_closed_stream_surfaces() {
        let (mut session, _) = interpreter(vec![Reply::Eof]);
        assert!(matches!(
            session.wait_for_stop().unwrap_err(),
            Error::StreamClosed
        ));
    }

    #[test]
    fn test_read_banner_collects_console_text() {
        let (mut session, _) = interpreter(vec![
            Reply::Line("=thread-group-added,id=\"i1\""),
            Reply::Line("~\"GNU gdb (GDB) 12.1\\n\""),
            Reply::Line("~\"This GDB was configured as \\\"x86_64-linux-gnu\\\".\\n\""),
            Reply::Line("(gdb)"),
        ]);
        let banner = session.read_banner().unwrap();
        assert!(banner.contains("GNU gdb (GDB) 12.1"));
        assert!(banner.contains("x86_64-linux-gnu"));
    }

    #[test]
    fn test_interpreter_exec_console_captures_output() {
        let (mut session, sent) = interpreter(vec![
            Reply::Line("~\"Line 68 of \\\"myprog.c\\\" starts at address 0x8048564.\\n\""),
            Reply::Line("1^done"),
            Reply::Line("(gdb)"),
        ]);
        let text = session.interpreter_exec_console("info line main").unwrap();
        assert!(text.contains("starts at address"));
        assert_eq!(
            *sent.borrow(),
            vec!["1-interpreter-exec console \"info line main\""]
        );
    }

    #[test]
    fn test_gdb_exit_needs_no_prompt() {
        let (mut session, _) = interpreter(vec![Reply::Line("1^exit")]);
        session.gdb_exit().unwrap();
    }
}
