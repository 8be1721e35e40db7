//! Typed projections of generic result payloads.
//!
//! Every record here is built exactly once from the fields of a result or
//! async record and never mutated afterwards. Required fields go through
//! [`Fields::find`], optional ones through [`Fields::find_opt`]; numeric
//! fields parse with an explicit radix and a parse failure surfaces the
//! offending field name and raw text.

use crate::probe::error::Error;
use crate::probe::mi::value::{Fields, List, Tuple, Value};
use std::fmt;
use std::str::FromStr;
use strum_macros::{Display, EnumString};

/// Projection of a field set into a domain record. Implemented once per
/// record, so the dispatch by target type is static and compiler-checked.
pub trait FromMi: Sized {
    fn from_mi(fields: &Fields) -> Result<Self, Error>;
}

// --------------------------------- scalar helpers ------------------------------------------------

fn str_field(fields: &Fields, name: &'static str) -> Result<String, Error> {
    Ok(fields.find(name)?.expect_str()?.to_string())
}

fn opt_str_field(fields: &Fields, name: &'static str) -> Result<Option<String>, Error> {
    match fields.find_opt(name) {
        Some(value) => Ok(Some(value.expect_str()?.to_string())),
        None => Ok(None),
    }
}

fn parse_dec(name: &'static str, raw: &str) -> Result<u64, Error> {
    raw.parse::<u64>().map_err(|_| Error::InvalidField {
        field: name,
        raw: raw.to_string(),
    })
}

fn parse_hex(name: &'static str, raw: &str) -> Result<u64, Error> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    u64::from_str_radix(digits, 16).map_err(|_| Error::InvalidField {
        field: name,
        raw: raw.to_string(),
    })
}

// the debugger prints exit codes in octal
fn parse_oct(name: &'static str, raw: &str) -> Result<i32, Error> {
    i32::from_str_radix(raw, 8).map_err(|_| Error::InvalidField {
        field: name,
        raw: raw.to_string(),
    })
}

fn dec_field(fields: &Fields, name: &'static str) -> Result<u64, Error> {
    parse_dec(name, fields.find(name)?.expect_str()?)
}

fn opt_dec_field(fields: &Fields, name: &'static str) -> Result<Option<u64>, Error> {
    match fields.find_opt(name) {
        Some(value) => Ok(Some(parse_dec(name, value.expect_str()?)?)),
        None => Ok(None),
    }
}

fn hex_field(fields: &Fields, name: &'static str) -> Result<u64, Error> {
    parse_hex(name, fields.find(name)?.expect_str()?)
}

fn opt_hex_field(fields: &Fields, name: &'static str) -> Result<Option<u64>, Error> {
    match fields.find_opt(name) {
        Some(value) => Ok(Some(parse_hex(name, value.expect_str()?)?)),
        None => Ok(None),
    }
}

fn flag_field(fields: &Fields, name: &'static str) -> Result<bool, Error> {
    match fields.find(name)?.expect_str()? {
        "y" => Ok(true),
        "n" => Ok(false),
        raw => Err(Error::InvalidField {
            field: name,
            raw: raw.to_string(),
        }),
    }
}

fn opt_bool_field(fields: &Fields, name: &'static str) -> Result<Option<bool>, Error> {
    match fields.find_opt(name) {
        Some(value) => match value.expect_str()? {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            raw => Err(Error::InvalidField {
                field: name,
                raw: raw.to_string(),
            }),
        },
        None => Ok(None),
    }
}

fn list_tuples(list: &List) -> Result<Vec<&Tuple>, Error> {
    match list {
        List::Empty => Ok(vec![]),
        List::Values(values) => values.iter().map(Value::expect_tuple).collect(),
        List::Results(fields) => fields.iter().map(|(_, v)| v.expect_tuple()).collect(),
    }
}

fn list_strings(list: &List) -> Result<Vec<String>, Error> {
    match list {
        List::Empty => Ok(vec![]),
        List::Values(values) => values
            .iter()
            .map(|v| v.expect_str().map(ToString::to_string))
            .collect(),
        List::Results(fields) => fields
            .iter()
            .map(|(_, v)| v.expect_str().map(ToString::to_string))
            .collect(),
    }
}

// --------------------------------- breakpoints ---------------------------------------------------

/// Breakpoint number: `1` for a plain breakpoint, `1.2` for the second
/// location of a multiple-location one. Stop events report the major part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BreakpointNumber {
    pub major: u32,
    pub minor: Option<u32>,
}

impl BreakpointNumber {
    fn parse(name: &'static str, raw: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidField {
            field: name,
            raw: raw.to_string(),
        };
        match raw.split_once('.') {
            Some((major, minor)) => Ok(Self {
                major: major.parse().map_err(|_| invalid())?,
                minor: Some(minor.parse().map_err(|_| invalid())?),
            }),
            None => Ok(Self {
                major: raw.parse().map_err(|_| invalid())?,
                minor: None,
            }),
        }
    }
}

impl fmt::Display for BreakpointNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.minor {
            Some(minor) => write!(f, "{}.{}", self.major, minor),
            None => write!(f, "{}", self.major),
        }
    }
}

/// Address slot of a breakpoint record. Deferred and multiple-location
/// breakpoints carry placeholders instead of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointAddress {
    At(u64),
    Pending,
    Multiple,
}

impl BreakpointAddress {
    fn parse(name: &'static str, raw: &str) -> Result<Self, Error> {
        match raw {
            "<PENDING>" => Ok(BreakpointAddress::Pending),
            "<MULTIPLE>" => Ok(BreakpointAddress::Multiple),
            raw => Ok(BreakpointAddress::At(parse_hex(name, raw)?)),
        }
    }

    pub fn at(&self) -> Option<u64> {
        match self {
            BreakpointAddress::At(addr) => Some(*addr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub number: BreakpointNumber,
    pub kind: Option<String>,
    pub disp: Option<String>,
    pub enabled: bool,
    pub addr: Option<BreakpointAddress>,
    pub func: Option<String>,
    pub file: Option<String>,
    pub fullname: Option<String>,
    pub line: Option<u64>,
    pub thread_groups: Vec<String>,
    pub times: Option<u64>,
    pub condition: Option<String>,
    pub ignore: Option<u64>,
    pub original_location: Option<String>,
}

impl FromMi for Breakpoint {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        let addr = match fields.find_opt("addr") {
            Some(value) => Some(BreakpointAddress::parse("addr", value.expect_str()?)?),
            None => None,
        };
        let thread_groups = match fields.find_opt("thread-groups") {
            Some(value) => list_strings(value.expect_list()?)?,
            None => vec![],
        };
        Ok(Self {
            number: BreakpointNumber::parse("number", fields.find("number")?.expect_str()?)?,
            kind: opt_str_field(fields, "type")?,
            disp: opt_str_field(fields, "disp")?,
            enabled: flag_field(fields, "enabled")?,
            addr,
            func: opt_str_field(fields, "func")?,
            file: opt_str_field(fields, "file")?,
            fullname: opt_str_field(fields, "fullname")?,
            line: opt_dec_field(fields, "line")?,
            thread_groups,
            times: opt_dec_field(fields, "times")?,
            condition: opt_str_field(fields, "cond")?,
            ignore: opt_dec_field(fields, "ignore")?,
            original_location: opt_str_field(fields, "original-location")?,
        })
    }
}

/// Every breakpoint known to the debugger (`-break-list`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointTable {
    pub breakpoints: Vec<Breakpoint>,
}

impl FromMi for BreakpointTable {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        let table = fields.find("BreakpointTable")?.expect_tuple()?;
        let body = table.0.find("body")?.expect_list()?;
        let breakpoints = list_tuples(body)?
            .into_iter()
            .map(|t| Breakpoint::from_mi(&t.0))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { breakpoints })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watchpoint {
    pub number: BreakpointNumber,
    pub expression: String,
}

impl FromMi for Watchpoint {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        Ok(Self {
            number: BreakpointNumber::parse("number", fields.find("number")?.expect_str()?)?,
            expression: str_field(fields, "exp")?,
        })
    }
}

// --------------------------------- stop events ---------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Display, EnumString)]
pub enum StopReason {
    #[strum(serialize = "breakpoint-hit")]
    BreakpointHit,
    #[strum(serialize = "watchpoint-trigger")]
    WatchpointTrigger,
    #[strum(serialize = "read-watchpoint-trigger")]
    ReadWatchpointTrigger,
    #[strum(serialize = "access-watchpoint-trigger")]
    AccessWatchpointTrigger,
    #[strum(serialize = "watchpoint-scope")]
    WatchpointScope,
    #[strum(serialize = "function-finished")]
    FunctionFinished,
    #[strum(serialize = "location-reached")]
    LocationReached,
    #[strum(serialize = "end-stepping-range")]
    EndSteppingRange,
    #[strum(serialize = "exited")]
    Exited,
    #[strum(serialize = "exited-normally")]
    ExitedNormally,
    #[strum(serialize = "exited-signalled")]
    ExitedSignalled,
    #[strum(serialize = "signal-received")]
    SignalReceived,
    #[strum(default)]
    Other(String),
}

/// Which threads the stop applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoppedThreads {
    All,
    Ids(Vec<u32>),
}

/// Payload of an `*stopped` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopEvent {
    pub reason: Option<StopReason>,
    pub thread_id: Option<u32>,
    pub stopped_threads: Option<StoppedThreads>,
    pub bkptno: Option<BreakpointNumber>,
    pub frame: Option<FrameDescription>,
    pub exit_code: Option<i32>,
    pub signal_name: Option<String>,
    pub signal_meaning: Option<String>,
}

impl StopEvent {
    /// Exit code of the target, if this event terminates it.
    pub fn target_exit_code(&self) -> Option<i32> {
        match self.reason {
            Some(StopReason::ExitedNormally) => Some(self.exit_code.unwrap_or(0)),
            Some(StopReason::Exited) | Some(StopReason::ExitedSignalled) => {
                Some(self.exit_code.unwrap_or(-1))
            }
            _ => None,
        }
    }
}

impl FromMi for StopEvent {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        let reason = match fields.find_opt("reason") {
            // infallible: unknown reasons fall through to `Other`
            Some(value) => Some(StopReason::from_str(value.expect_str()?).unwrap()),
            None => None,
        };
        let stopped_threads = match fields.find_opt("stopped-threads") {
            Some(Value::Str(s)) if s == "all" => Some(StoppedThreads::All),
            Some(value) => {
                let ids = list_strings(value.expect_list()?)?
                    .iter()
                    .map(|s| parse_dec("stopped-threads", s).map(|id| id as u32))
                    .collect::<Result<Vec<_>, _>>()?;
                Some(StoppedThreads::Ids(ids))
            }
            None => None,
        };
        let bkptno = match fields.find_opt("bkptno") {
            Some(value) => Some(BreakpointNumber::parse("bkptno", value.expect_str()?)?),
            None => None,
        };
        let frame = match fields.find_opt("frame") {
            Some(value) => Some(FrameDescription::from_mi(&value.expect_tuple()?.0)?),
            None => None,
        };
        let exit_code = match fields.find_opt("exit-code") {
            Some(value) => Some(parse_oct("exit-code", value.expect_str()?)?),
            None => None,
        };
        Ok(Self {
            reason,
            thread_id: opt_dec_field(fields, "thread-id")?.map(|id| id as u32),
            stopped_threads,
            bkptno,
            frame,
            exit_code,
            signal_name: opt_str_field(fields, "signal-name")?,
            signal_meaning: opt_str_field(fields, "signal-meaning")?,
        })
    }
}

// --------------------------------- stack and frames ----------------------------------------------

/// Function argument as the debugger reports it: a bare name, or a
/// name/value pair when values were requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub name: String,
    pub value: Option<String>,
}

fn args_of(list: &List) -> Result<Vec<Arg>, Error> {
    // name-only mode prints `name="argc"` entries and bare strings, value
    // modes print `{name=…,value=…}` tuples
    fn arg_of(value: &Value) -> Result<Arg, Error> {
        match value {
            Value::Str(name) => Ok(Arg {
                name: name.clone(),
                value: None,
            }),
            Value::Tuple(tuple) => Ok(Arg {
                name: str_field(&tuple.0, "name")?,
                value: opt_str_field(&tuple.0, "value")?,
            }),
            Value::List(_) => Err(Error::WrongVariant {
                expected: "string or tuple",
                got: "list",
            }),
        }
    }
    match list {
        List::Empty => Ok(vec![]),
        List::Values(values) => values.iter().map(arg_of).collect(),
        List::Results(fields) => fields.iter().map(|(_, value)| arg_of(value)).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDescription {
    pub level: Option<u32>,
    pub addr: Option<u64>,
    pub func: Option<String>,
    pub args: Vec<Arg>,
    pub file: Option<String>,
    pub fullname: Option<String>,
    pub line: Option<u64>,
    pub from: Option<String>,
    pub arch: Option<String>,
}

impl FromMi for FrameDescription {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        let args = match fields.find_opt("args") {
            Some(value) => args_of(value.expect_list()?)?,
            None => vec![],
        };
        Ok(Self {
            level: opt_dec_field(fields, "level")?.map(|l| l as u32),
            addr: opt_hex_field(fields, "addr")?,
            func: opt_str_field(fields, "func")?,
            args,
            file: opt_str_field(fields, "file")?,
            fullname: opt_str_field(fields, "fullname")?,
            line: opt_dec_field(fields, "line")?,
            from: opt_str_field(fields, "from")?,
            arch: opt_str_field(fields, "arch")?,
        })
    }
}

/// `-stack-list-frames` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    pub frames: Vec<FrameDescription>,
}

impl FromMi for Stack {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        let frames = list_tuples(fields.find("stack")?.expect_list()?)?
            .into_iter()
            .map(|t| FrameDescription::from_mi(&t.0))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { frames })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackDepth(pub u32);

impl FromMi for StackDepth {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        Ok(Self(dec_field(fields, "depth")? as u32))
    }
}

/// One frame of a `-stack-list-arguments` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameArgs {
    pub level: u32,
    pub args: Vec<Arg>,
}

impl FromMi for FrameArgs {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        let args = match fields.find_opt("args") {
            Some(value) => args_of(value.expect_list()?)?,
            None => vec![],
        };
        Ok(Self {
            level: dec_field(fields, "level")? as u32,
            args,
        })
    }
}

/// All frames of a `-stack-list-arguments` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackArgs {
    pub frames: Vec<FrameArgs>,
}

impl FromMi for StackArgs {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        let frames = list_tuples(fields.find("stack-args")?.expect_list()?)?
            .into_iter()
            .map(|t| FrameArgs::from_mi(&t.0))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { frames })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    pub name: String,
    pub is_arg: bool,
    pub value: Option<String>,
    pub type_name: Option<String>,
}

/// `-stack-list-variables` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariables {
    pub variables: Vec<LocalVariable>,
}

impl FromMi for LocalVariables {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        let variables = list_tuples(fields.find("variables")?.expect_list()?)?
            .into_iter()
            .map(|t| {
                Ok(LocalVariable {
                    name: str_field(&t.0, "name")?,
                    is_arg: matches!(t.0.find_opt("arg"), Some(Value::Str(s)) if s == "1"),
                    value: opt_str_field(&t.0, "value")?,
                    type_name: opt_str_field(&t.0, "type")?,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Self { variables })
    }
}

// --------------------------------- variable objects ----------------------------------------------

/// `-var-create` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarObj {
    pub name: String,
    pub numchild: u64,
    pub value: Option<String>,
    pub type_name: Option<String>,
    pub thread_id: Option<u32>,
    pub has_more: Option<u64>,
}

impl FromMi for VarObj {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        Ok(Self {
            name: str_field(fields, "name")?,
            numchild: dec_field(fields, "numchild")?,
            value: opt_str_field(fields, "value")?,
            type_name: opt_str_field(fields, "type")?,
            thread_id: opt_dec_field(fields, "thread-id")?.map(|id| id as u32),
            has_more: opt_dec_field(fields, "has_more")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarChild {
    pub name: String,
    pub expression: Option<String>,
    pub numchild: u64,
    pub value: Option<String>,
    pub type_name: Option<String>,
}

/// `-var-list-children` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarChildren {
    pub children: Vec<VarChild>,
    pub has_more: Option<u64>,
}

impl FromMi for VarChildren {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        let children = match fields.find_opt("children") {
            Some(value) => list_tuples(value.expect_list()?)?
                .into_iter()
                .map(|t| {
                    Ok(VarChild {
                        name: str_field(&t.0, "name")?,
                        expression: opt_str_field(&t.0, "exp")?,
                        numchild: dec_field(&t.0, "numchild")?,
                        value: opt_str_field(&t.0, "value")?,
                        type_name: opt_str_field(&t.0, "type")?,
                    })
                })
                .collect::<Result<Vec<_>, Error>>()?,
            None => vec![],
        };
        Ok(Self {
            children,
            has_more: opt_dec_field(fields, "has_more")?,
        })
    }
}

/// Scope verdict of a `-var-update` change entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum InScope {
    #[strum(serialize = "true")]
    Yes,
    #[strum(serialize = "false")]
    No,
    #[strum(serialize = "invalid")]
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarChange {
    pub name: String,
    pub value: Option<String>,
    pub in_scope: InScope,
    pub type_changed: bool,
}

/// `-var-update` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarChanges {
    pub changes: Vec<VarChange>,
}

impl FromMi for VarChanges {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        let changes = list_tuples(fields.find("changelist")?.expect_list()?)?
            .into_iter()
            .map(|t| {
                let raw_scope = t.0.find("in_scope")?.expect_str()?;
                let in_scope = InScope::from_str(raw_scope).map_err(|_| Error::InvalidField {
                    field: "in_scope",
                    raw: raw_scope.to_string(),
                })?;
                Ok(VarChange {
                    name: str_field(&t.0, "name")?,
                    value: opt_str_field(&t.0, "value")?,
                    in_scope,
                    type_changed: matches!(
                        t.0.find_opt("type_changed"),
                        Some(Value::Str(s)) if s == "true"
                    ),
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Self { changes })
    }
}

// --------------------------------- threads -------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum ThreadState {
    #[strum(serialize = "running")]
    Running,
    #[strum(serialize = "stopped")]
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub id: u32,
    pub target_id: Option<String>,
    pub name: Option<String>,
    pub state: ThreadState,
    pub core: Option<u32>,
    pub frame: Option<FrameDescription>,
}

impl FromMi for Thread {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        let raw_state = fields.find("state")?.expect_str()?;
        let state = ThreadState::from_str(raw_state).map_err(|_| Error::InvalidField {
            field: "state",
            raw: raw_state.to_string(),
        })?;
        let frame = match fields.find_opt("frame") {
            Some(value) => Some(FrameDescription::from_mi(&value.expect_tuple()?.0)?),
            None => None,
        };
        Ok(Self {
            id: dec_field(fields, "id")? as u32,
            target_id: opt_str_field(fields, "target-id")?,
            name: opt_str_field(fields, "name")?,
            state,
            core: opt_dec_field(fields, "core")?.map(|c| c as u32),
            frame,
        })
    }
}

/// `-thread-info` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub threads: Vec<Thread>,
    pub current_thread_id: Option<u32>,
}

impl FromMi for ThreadInfo {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        let threads = list_tuples(fields.find("threads")?.expect_list()?)?
            .into_iter()
            .map(|t| Thread::from_mi(&t.0))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            threads,
            current_thread_id: opt_dec_field(fields, "current-thread-id")?.map(|id| id as u32),
        })
    }
}

/// `-thread-select` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSelection {
    pub new_thread_id: u32,
    pub frame: Option<FrameDescription>,
}

impl FromMi for ThreadSelection {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        let frame = match fields.find_opt("frame") {
            Some(value) => Some(FrameDescription::from_mi(&value.expect_tuple()?.0)?),
            None => None,
        };
        Ok(Self {
            new_thread_id: dec_field(fields, "new-thread-id")? as u32,
            frame,
        })
    }
}

/// `=thread-group-started` and friends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadGroup {
    pub id: String,
    pub pid: Option<u64>,
}

impl FromMi for ThreadGroup {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        Ok(Self {
            id: str_field(fields, "id")?,
            pid: opt_dec_field(fields, "pid")?,
        })
    }
}

// --------------------------------- memory and registers ------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryBlock {
    pub begin: u64,
    pub offset: u64,
    pub end: u64,
    pub contents: Vec<u8>,
}

fn decode_hex_bytes(name: &'static str, raw: &str) -> Result<Vec<u8>, Error> {
    let invalid = || Error::InvalidField {
        field: name,
        raw: raw.to_string(),
    };
    if raw.len() % 2 != 0 {
        return Err(invalid());
    }
    (0..raw.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&raw[i..i + 2], 16).map_err(|_| invalid()))
        .collect()
}

impl FromMi for MemoryBlock {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        Ok(Self {
            begin: hex_field(fields, "begin")?,
            offset: opt_hex_field(fields, "offset")?.unwrap_or(0),
            end: hex_field(fields, "end")?,
            contents: decode_hex_bytes("contents", fields.find("contents")?.expect_str()?)?,
        })
    }
}

/// `-data-read-memory-bytes` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRead {
    pub blocks: Vec<MemoryBlock>,
}

impl MemoryRead {
    /// Contents of all blocks, in address order.
    pub fn bytes(&self) -> Vec<u8> {
        let mut blocks: Vec<_> = self.blocks.iter().collect();
        blocks.sort_by_key(|b| b.begin);
        blocks.iter().flat_map(|b| b.contents.clone()).collect()
    }
}

impl FromMi for MemoryRead {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        let blocks = list_tuples(fields.find("memory")?.expect_list()?)?
            .into_iter()
            .map(|t| MemoryBlock::from_mi(&t.0))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { blocks })
    }
}

/// `-data-list-register-names` reply. Holes in the register file come
/// through as empty names and are preserved: the index is the register number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterNames {
    pub names: Vec<String>,
}

impl FromMi for RegisterNames {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        Ok(Self {
            names: list_strings(fields.find("register-names")?.expect_list()?)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterValue {
    pub number: u32,
    pub value: String,
}

/// `-data-list-register-values` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterValues {
    pub registers: Vec<RegisterValue>,
}

impl FromMi for RegisterValues {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        let registers = list_tuples(fields.find("register-values")?.expect_list()?)?
            .into_iter()
            .map(|t| {
                Ok(RegisterValue {
                    number: dec_field(&t.0, "number")? as u32,
                    value: str_field(&t.0, "value")?,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Self { registers })
    }
}

/// `-data-evaluate-expression` (and `-gdb-show`) reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalResult {
    pub value: String,
}

impl FromMi for EvalResult {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        Ok(Self {
            value: str_field(fields, "value")?,
        })
    }
}

// --------------------------------- disassembly ---------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmInstruction {
    pub address: u64,
    pub func_name: Option<String>,
    pub offset: Option<u64>,
    pub inst: String,
    pub opcodes: Option<String>,
}

impl FromMi for AsmInstruction {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        Ok(Self {
            address: hex_field(fields, "address")?,
            func_name: opt_str_field(fields, "func-name")?,
            offset: opt_dec_field(fields, "offset")?,
            inst: str_field(fields, "inst")?,
            opcodes: opt_str_field(fields, "opcodes")?,
        })
    }
}

/// One source line of a mixed-mode disassembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLineAsm {
    pub line: u64,
    pub file: String,
    pub fullname: Option<String>,
    pub instructions: Vec<AsmInstruction>,
}

impl FromMi for SourceLineAsm {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        let instructions = match fields.find_opt("line_asm_insn") {
            Some(value) => list_tuples(value.expect_list()?)?
                .into_iter()
                .map(|t| AsmInstruction::from_mi(&t.0))
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![],
        };
        Ok(Self {
            line: dec_field(fields, "line")?,
            file: str_field(fields, "file")?,
            fullname: opt_str_field(fields, "fullname")?,
            instructions,
        })
    }
}

/// `-data-disassemble` reply: plain instruction list or source-mixed lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disassembly {
    Plain(Vec<AsmInstruction>),
    Mixed(Vec<SourceLineAsm>),
}

impl FromMi for Disassembly {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        let insns = fields.find("asm_insns")?.expect_list()?;
        match insns {
            List::Empty => Ok(Disassembly::Plain(vec![])),
            List::Values(_) => {
                let instructions = list_tuples(insns)?
                    .into_iter()
                    .map(|t| AsmInstruction::from_mi(&t.0))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Disassembly::Plain(instructions))
            }
            List::Results(entries) => {
                let lines = entries
                    .iter()
                    .map(|(_, v)| SourceLineAsm::from_mi(&v.expect_tuple()?.0))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Disassembly::Mixed(lines))
            }
        }
    }
}

/// Source location resolved from a code address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressInfo {
    pub func: Option<String>,
    pub file: String,
    pub fullname: Option<String>,
    pub line: u64,
}

// --------------------------------- target transfer -----------------------------------------------

/// `+download` progress notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    pub section: Option<String>,
    pub section_sent: Option<u64>,
    pub section_size: Option<u64>,
    pub total_sent: Option<u64>,
    pub total_size: Option<u64>,
}

impl FromMi for DownloadProgress {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        Ok(Self {
            section: opt_str_field(fields, "section")?,
            section_sent: opt_dec_field(fields, "section-sent")?,
            section_size: opt_dec_field(fields, "section-size")?,
            total_sent: opt_dec_field(fields, "total-sent")?,
            total_size: opt_dec_field(fields, "total-size")?,
        })
    }
}

/// `-target-download` terminal reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    pub address: Option<u64>,
    pub load_size: Option<u64>,
    pub transfer_rate: Option<u64>,
    pub write_rate: Option<u64>,
}

impl FromMi for DownloadSummary {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        Ok(Self {
            address: opt_hex_field(fields, "address")?,
            load_size: opt_dec_field(fields, "load-size")?,
            transfer_rate: opt_dec_field(fields, "transfer-rate")?,
            write_rate: opt_dec_field(fields, "write-rate")?,
        })
    }
}

/// `-target-select` reply payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectInfo {
    pub addr: Option<u64>,
    pub func: Option<String>,
}

impl FromMi for ConnectInfo {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        Ok(Self {
            addr: opt_hex_field(fields, "addr")?,
            func: opt_str_field(fields, "func")?,
        })
    }
}

// --------------------------------- tracing and misc ----------------------------------------------

/// `-trace-status` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceStatus {
    pub supported: bool,
    pub running: Option<bool>,
    pub frames: Option<u64>,
    pub buffer_size: Option<u64>,
    pub buffer_free: Option<u64>,
    pub stop_reason: Option<String>,
}

impl FromMi for TraceStatus {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        let supported = match fields.find("supported")?.expect_str()? {
            "0" => false,
            _ => true,
        };
        Ok(Self {
            supported,
            running: opt_bool_field(fields, "running")?,
            frames: opt_dec_field(fields, "frames")?,
            buffer_size: opt_dec_field(fields, "buffer-size")?,
            buffer_free: opt_dec_field(fields, "buffer-free")?,
            stop_reason: opt_str_field(fields, "stop-reason")?,
        })
    }
}

/// `-file-list-exec-source-file` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFileInfo {
    pub line: Option<u64>,
    pub file: String,
    pub fullname: Option<String>,
}

impl FromMi for SourceFileInfo {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        Ok(Self {
            line: opt_dec_field(fields, "line")?,
            file: str_field(fields, "file")?,
            fullname: opt_str_field(fields, "fullname")?,
        })
    }
}

/// `-list-features` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureList {
    pub features: Vec<String>,
}

impl FromMi for FeatureList {
    fn from_mi(fields: &Fields) -> Result<Self, Error> {
        Ok(Self {
            features: list_strings(fields.find("features")?.expect_list()?)?,
        })
    }
}
