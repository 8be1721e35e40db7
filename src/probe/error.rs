use crate::probe::mi::output::ParseError;
use crate::probe::mi::output::ResultClass;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- generic errors --------------------------------------------
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    RegEx(#[from] regex::Error),
    #[error("configuration: {0}")]
    Config(#[from] toml::de::Error),

    // --------------------------------- wire errors -----------------------------------------------
    #[error(transparent)]
    Parse(#[from] ParseError),

    // --------------------------------- protocol errors -------------------------------------------
    #[error("unexpected record while no command is outstanding: {0}")]
    UnexpectedRecord(String),
    #[error("async record `{class}` carries token {token} but nobody waits for it")]
    UnexpectedAsyncRecord { class: String, token: u64 },
    #[error("mismatched result token: expected {expected}, got {got}")]
    MismatchedToken { expected: u64, got: u64 },
    #[error("result record without a token while command {0} is outstanding")]
    UntaggedResult(u64),
    #[error("unexpected result class: expected `{expected}`, got `{got}`")]
    UnexpectedResultClass {
        expected: ResultClass,
        got: ResultClass,
    },
    #[error("gdb: {msg}")]
    Gdb { msg: String, code: Option<String> },

    // --------------------------------- projection errors -----------------------------------------
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),
    #[error("value is not a {expected} (got {got})")]
    WrongVariant {
        expected: &'static str,
        got: &'static str,
    },
    #[error("field `{field}` holds unparsable value `{raw}`")]
    InvalidField { field: &'static str, raw: String },

    // --------------------------------- debugger process errors -----------------------------------
    #[error("debugger binary not found: {0}")]
    DebuggerNotFound(#[from] which::Error),
    #[error("start debugger process: {0}")]
    Launch(std::io::Error),
    #[error("no response from debugger within {0:?}")]
    WatchdogTimeout(Duration),
    #[error("debugger closed its output stream")]
    StreamClosed,

    // --------------------------------- third party errors ----------------------------------------
    #[error("handler: {0}")]
    Hook(#[source] anyhow::Error),
}

impl Error {
    /// Return a hint to the caller - continue the run after this error or tear the session down.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::IO(_) => false,
            Error::RegEx(_) => false,
            Error::Config(_) => false,
            Error::Parse(_) => false,
            Error::Gdb { .. } => false,
            Error::MissingField(_) => false,
            Error::WrongVariant { .. } => false,
            Error::InvalidField { .. } => false,
            Error::Hook(_) => false,

            // a miscorrelated token means the session is desynchronized
            Error::UnexpectedRecord(_) => true,
            Error::UnexpectedAsyncRecord { .. } => true,
            Error::MismatchedToken { .. } => true,
            Error::UntaggedResult(_) => true,
            Error::UnexpectedResultClass { .. } => true,
            Error::DebuggerNotFound(_) => true,
            Error::Launch(_) => true,
            Error::WatchdogTimeout(_) => true,
            Error::StreamClosed => true,
        }
    }
}

#[macro_export]
macro_rules! _error {
    ($log_fn: path, $res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "probe", "{:#}", e);
                None
            }
        }
    };
    ($log_fn: path, $res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "probe", concat!($msg, " {:#}"), e);
                None
            }
        }
    };
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        $crate::_error!(log::warn, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::warn, $res, $msg)
    };
}

/// Transforms `Result` into `Option` and put error into debug logs if it occurs.
#[macro_export]
macro_rules! muted_error {
    ($res: expr) => {
        $crate::_error!(log::debug, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::debug, $res, $msg)
    };
}
