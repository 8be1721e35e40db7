//! Output records of the MI2 protocol.
//!
//! One debugger line parses into exactly one [`Output`]: a stream record
//! (free text bound to a channel), an async record (an event notification,
//! optionally tagged with a command token), a result record (the terminal
//! reply to a command) or the `(gdb)` terminal marker.

use crate::probe::mi::grammar::{self, RawOutput};
use crate::probe::mi::value::{escape, Fields, Value};
use chumsky::Parser;
use std::fmt;
use std::str::FromStr;
use strum_macros::{Display, EnumString};

/// Wire parsing failure. Always recoverable: it poisons a single line,
/// never the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed output line: {0}")]
    Malformed(String),
    #[error("unknown result class `{0}`")]
    UnknownResultClass(String),
    #[error("unnamed entry without a preceding named entry")]
    OrphanValue,
}

/// Stream destination. The debugger multiplexes three text channels over
/// its output pipe; none of them correlates with commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamChannel {
    /// `~` - console output, the CLI answer text.
    Console,
    /// `@` - output produced by the target program.
    Target,
    /// `&` - debugger internal log, echoed CLI commands and warnings.
    Log,
}

impl StreamChannel {
    fn prefix(self) -> char {
        match self {
            StreamChannel::Console => '~',
            StreamChannel::Target => '@',
            StreamChannel::Log => '&',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub channel: StreamChannel,
    pub text: String,
}

/// Async record kind, distinguished by the prefix character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncKind {
    /// `*` - execution state change (stopped, running).
    Exec,
    /// `+` - progress of a slow operation.
    Status,
    /// `=` - general notification.
    Notify,
}

impl AsyncKind {
    fn prefix(self) -> char {
        match self {
            AsyncKind::Exec => '*',
            AsyncKind::Status => '+',
            AsyncKind::Notify => '=',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncOutput {
    pub kind: AsyncKind,
    pub class: String,
    pub token: Option<u64>,
    pub fields: Fields,
}

/// Terminal reply class of a result record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum ResultClass {
    #[strum(serialize = "done")]
    Done,
    #[strum(serialize = "running")]
    Running,
    #[strum(serialize = "connected")]
    Connected,
    #[strum(serialize = "error")]
    Error,
    #[strum(serialize = "exit")]
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultOutput {
    pub token: Option<u64>,
    pub class: ResultClass,
    pub fields: Fields,
}

/// One parsed line of debugger output.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Stream(StreamRecord),
    Async(AsyncOutput),
    Result(ResultOutput),
    /// The `(gdb)` marker: no more output for this round-trip.
    Prompt,
}

/// Parse a single line (terminators already stripped).
pub fn parse_line(text: &str) -> Result<Output, ParseError> {
    let raw = grammar::line()
        .parse(text)
        .into_result()
        .map_err(|errors| ParseError::Malformed(errors[0].to_string()))?;

    let output = match raw {
        RawOutput::Prompt => Output::Prompt,
        RawOutput::Stream(stream) => Output::Stream(stream),
        RawOutput::Async {
            token,
            kind,
            class,
            fields,
        } => Output::Async(AsyncOutput {
            kind,
            class,
            token,
            fields,
        }),
        RawOutput::Result {
            token,
            class,
            fields,
        } => {
            let class = ResultClass::from_str(&class)
                .map_err(|_| ParseError::UnknownResultClass(class))?;
            Output::Result(ResultOutput {
                token,
                class,
                fields: resolve_continuations(fields)?,
            })
        }
    };
    Ok(output)
}

/// Give anonymous continuation entries the name of their predecessor.
///
/// A `^done` payload may continue a named entry with bare values (several
/// `bkpt` tuples after a multiple-location insert). The inherited name is
/// tracked in a local, per-payload context.
fn resolve_continuations(raw: Vec<(Option<String>, Value)>) -> Result<Fields, ParseError> {
    let mut fields = Vec::with_capacity(raw.len());
    let mut last_name: Option<String> = None;

    for (name, value) in raw {
        let name = match name {
            Some(name) => {
                last_name = Some(name.clone());
                name
            }
            None => last_name.clone().ok_or(ParseError::OrphanValue)?,
        };
        fields.push((name, value));
    }

    Ok(Fields::new(fields))
}

fn write_token(f: &mut fmt::Formatter<'_>, token: Option<u64>) -> fmt::Result {
    if let Some(token) = token {
        write!(f, "{token}")?;
    }
    Ok(())
}

fn write_payload(f: &mut fmt::Formatter<'_>, fields: &Fields) -> fmt::Result {
    for (name, value) in fields.iter() {
        write!(f, ",{name}={value}")?;
    }
    Ok(())
}

impl fmt::Display for StreamRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\"{}\"", self.channel.prefix(), escape(&self.text))
    }
}

impl fmt::Display for AsyncOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_token(f, self.token)?;
        write!(f, "{}{}", self.kind.prefix(), self.class)?;
        write_payload(f, &self.fields)
    }
}

impl fmt::Display for ResultOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_token(f, self.token)?;
        write!(f, "^{}", self.class)?;
        write_payload(f, &self.fields)
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Stream(rec) => rec.fmt(f),
            Output::Async(rec) => rec.fmt(f),
            Output::Result(rec) => rec.fmt(f),
            Output::Prompt => f.write_str("(gdb)"),
        }
    }
}
