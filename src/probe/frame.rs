//! Per-stop-event façade over the session.
//!
//! A [`Frame`] is built fresh for each stop and handed to the owning
//! breakpoint handler; it is valid only until the handler returns. All
//! operations are thin encodings over session commands plus a micro-parser
//! for the textual values the debugger prints.

use crate::probe::breakpoint::{BreakPoint, BreakpointRegistry};
use crate::probe::error::Error;
use crate::probe::mi::types::{AddressInfo, Disassembly, FrameDescription};
use crate::probe::mi::{DisassembleMode, Interpreter};
use crate::{gp_debug, muted_error};
use chumsky::error::Rich;
use chumsky::prelude::*;
use chumsky::{extra, text};

/// Decoded printed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Var {
    Number(i128),
    Address(u64),
    Text(String),
    Char(char),
    Bits(String),
    Raw(String),
}

/// Shapes the debugger prints, before any re-fetching.
#[derive(Debug, Clone, PartialEq)]
enum Printed {
    /// `@0x…` reference marker, dereference and fetch again.
    Ref(u64),
    /// `0x… "text"` - a pointer together with the string it points at.
    PointerText {
        text: String,
        truncated: bool,
    },
    /// Bare address, possibly followed by a `<symbol>` suffix.
    Address(u64),
    /// `104 'h'` - a character with its numeric value.
    CharLit(char),
    /// Plain integer.
    Number(i128),
    /// `"text"`, `...`-suffixed when the debugger elided the tail.
    Text {
        text: String,
        truncated: bool,
    },
    Raw(String),
}

type Err<'a> = extra::Err<Rich<'a, char>>;

fn hex<'a>() -> impl Parser<'a, &'a str, u64, Err<'a>> + Clone {
    just("0x")
        .or(just("0X"))
        .ignore_then(
            text::digits(16)
                .at_least(1)
                .at_most(16)
                .to_slice()
                .map(|s: &str| u64::from_str_radix(s, 16).unwrap()),
        )
        .labelled("hexidecimal number")
}

fn escaped_char<'a>() -> impl Parser<'a, &'a str, char, Err<'a>> + Clone {
    let octal = text::digits(8)
        .at_least(1)
        .at_most(3)
        .to_slice()
        .map(|s: &str| u8::from_str_radix(s, 8).unwrap_or(0) as char);
    just('\\').ignore_then(choice((
        just('n').to('\n'),
        just('t').to('\t'),
        just('r').to('\r'),
        just('\\').to('\\'),
        just('\'').to('\''),
        just('"').to('"'),
        octal,
    )))
}

fn quoted_text<'a>() -> impl Parser<'a, &'a str, String, Err<'a>> + Clone {
    let plain = any().filter(|c: &char| *c != '"' && *c != '\\');
    plain
        .or(escaped_char())
        .repeated()
        .collect::<String>()
        .delimited_by(just('"'), just('"'))
}

fn printed<'a>() -> impl Parser<'a, &'a str, Printed, Err<'a>> {
    let ellipsis = just("...").or_not().map(|e| e.is_some());
    // 38 digits always fit an i128, longer literals fall through to raw
    let number = just('-')
        .or_not()
        .then(text::digits(10).at_least(1).at_most(38).to_slice())
        .to_slice()
        .map(|s: &str| s.parse::<i128>().unwrap());

    let reference = just('@')
        .ignore_then(hex())
        .then_ignore(any().repeated())
        .map(Printed::Ref);
    let pointer_text = hex()
        .then_ignore(just(' ').repeated().at_least(1))
        .ignore_then(quoted_text())
        .then(ellipsis.clone())
        .map(|(text, truncated)| Printed::PointerText { text, truncated });
    let char_lit = number
        .clone()
        .then_ignore(just(' ').repeated().at_least(1))
        .ignore_then(
            any()
                .filter(|c: &char| *c != '\'' && *c != '\\')
                .or(escaped_char())
                .delimited_by(just('\''), just('\'')),
        )
        .map(Printed::CharLit);
    let address = hex()
        .then_ignore(any().repeated())
        .map(Printed::Address);
    let text_lit = quoted_text()
        .then(ellipsis)
        .map(|(text, truncated)| Printed::Text { text, truncated });

    choice((
        reference,
        pointer_text,
        char_lit,
        address,
        number.map(Printed::Number),
        text_lit,
    ))
    .then_ignore(end())
}

fn parse_printed(raw: &str) -> Printed {
    printed()
        .parse(raw.trim())
        .into_result()
        .unwrap_or_else(|_| Printed::Raw(raw.to_string()))
}

fn bits_of(bytes: &[u8]) -> String {
    // raw memory is little-endian, the rendered bit string reads MSB first
    bytes.iter().rev().map(|b| format!("{b:08b}")).collect()
}

pub struct Frame<'a> {
    session: &'a mut Interpreter,
    breakpoints: &'a BreakpointRegistry,
    arguments: &'a [String],
    exit_requested: bool,
}

impl<'a> Frame<'a> {
    pub(crate) fn new(
        session: &'a mut Interpreter,
        breakpoints: &'a BreakpointRegistry,
        arguments: &'a [String],
    ) -> Self {
        Self {
            session,
            breakpoints,
            arguments,
            exit_requested: false,
        }
    }

    /// Argument names of the stopped function, in declaration order.
    pub fn arguments(&self) -> &[String] {
        self.arguments
    }

    /// Print `id` and decode the result.
    pub fn print(&mut self, id: &str) -> Result<Var, Error> {
        let raw = self.session.data_evaluate_expression(id)?;
        self.decode(id, &raw, true)
    }

    /// Print `id` as the raw bits of its object representation, MSB first.
    pub fn print_bitwise(&mut self, id: &str) -> Result<Var, Error> {
        let raw = self.session.data_evaluate_expression(&format!("sizeof({id})"))?;
        let size = match parse_printed(&raw) {
            Printed::Number(n) if n > 0 => n as usize,
            _ => {
                return Err(Error::InvalidField {
                    field: "sizeof",
                    raw,
                })
            }
        };

        if let Some(bytes) = self.read_object(id, size) {
            return Ok(Var::Bits(bits_of(&bytes)));
        }

        // no readable memory behind the expression (register variable,
        // remote target without memory access) - convert the printed value
        let raw = self.session.data_evaluate_expression(id)?;
        match parse_printed(&raw) {
            Printed::Number(n) => {
                let width = size * 8;
                let mask = if width >= 128 {
                    u128::MAX
                } else {
                    (1u128 << width) - 1
                };
                Ok(Var::Bits(format!(
                    "{:0width$b}",
                    (n as u128) & mask,
                    width = width
                )))
            }
            _ => Err(Error::InvalidField {
                field: "value",
                raw,
            }),
        }
    }

    /// Assign `value` to `id`.
    pub fn set(&mut self, id: &str, value: &str) -> Result<(), Error> {
        self.session
            .data_evaluate_expression(&format!("{id} = {value}"))?;
        Ok(())
    }

    /// Evaluate `expression` (typically a function call). `None` for void.
    pub fn call(&mut self, expression: &str) -> Result<Option<Var>, Error> {
        let raw = self.session.data_evaluate_expression(expression)?;
        if raw == "void" {
            return Ok(None);
        }
        self.decode(expression, &raw, true).map(Some)
    }

    /// Select stack frame `level` for subsequent operations.
    pub fn select(&mut self, level: u32) -> Result<(), Error> {
        self.session.stack_select_frame(level)
    }

    pub fn backtrace(&mut self) -> Result<Vec<FrameDescription>, Error> {
        self.session.stack_list_frames(None)
    }

    pub fn read_memory(&mut self, addr: u64, len: u64) -> Result<Vec<u8>, Error> {
        Ok(self.session.data_read_memory_bytes(addr, len)?.bytes())
    }

    pub fn write_memory(&mut self, addr: u64, bytes: &[u8]) -> Result<(), Error> {
        self.session.data_write_memory_bytes(addr, bytes)
    }

    /// Resolve a code address into its source location, best-effort.
    pub fn addr2line(&mut self, addr: u64) -> Option<AddressInfo> {
        let disassembly = muted_error!(
            self.session
                .data_disassemble(addr, addr + 1, DisassembleMode::Mixed),
            "addr2line:"
        )?;
        match disassembly {
            Disassembly::Mixed(lines) => lines.first().map(|line| AddressInfo {
                func: line
                    .instructions
                    .first()
                    .and_then(|i| i.func_name.clone()),
                file: line.file.clone(),
                fullname: line.fullname.clone(),
                line: line.line,
            }),
            Disassembly::Plain(_) => None,
        }
    }

    /// Disable the breakpoint owned by `handler`. A handler without an
    /// assigned number is a no-op (insertion failed earlier).
    pub fn disable(&mut self, handler: &dyn BreakPoint) -> Result<(), Error> {
        match self.breakpoints.number_of(&handler.identifier()) {
            Some(number) => self.session.break_disable(&[number]),
            None => {
                gp_debug!(target: "probe", "disable: no breakpoint for `{}`", handler.identifier());
                Ok(())
            }
        }
    }

    /// Re-enable the breakpoint owned by `handler`.
    pub fn enable(&mut self, handler: &dyn BreakPoint) -> Result<(), Error> {
        match self.breakpoints.number_of(&handler.identifier()) {
            Some(number) => self.session.break_enable(&[number]),
            None => {
                gp_debug!(target: "probe", "enable: no breakpoint for `{}`", handler.identifier());
                Ok(())
            }
        }
    }

    /// Signal run completion without a process exit. Embedded targets never
    /// return from `main`; the dispatch loop stops instead of resuming.
    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub(crate) fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    fn decode(&mut self, id: &str, raw: &str, follow_ref: bool) -> Result<Var, Error> {
        let var = match parse_printed(raw) {
            Printed::Ref(_) if follow_ref => {
                // one dereference round; a reference to a reference is raw
                let raw = self
                    .session
                    .data_evaluate_expression(&format!("*(&({id}))"))?;
                self.decode(id, &raw, false)?
            }
            Printed::Ref(addr) => Var::Address(addr),
            Printed::PointerText { text, truncated } => {
                let text = if truncated {
                    self.extend_text(id, text)?
                } else {
                    text
                };
                Var::Text(text)
            }
            Printed::Address(addr) => Var::Address(addr),
            Printed::CharLit(c) => Var::Char(c),
            Printed::Number(n) => Var::Number(n),
            Printed::Text { text, truncated } => {
                let text = if truncated {
                    self.extend_text(id, text)?
                } else {
                    text
                };
                Var::Text(text)
            }
            Printed::Raw(raw) => Var::Raw(raw),
        };
        Ok(var)
    }

    /// The debugger elides long strings; fetch the tail character by
    /// character until the terminator.
    fn extend_text(&mut self, id: &str, mut text: String) -> Result<String, Error> {
        loop {
            let index = text.len();
            let raw = self
                .session
                .data_evaluate_expression(&format!("{id}[{index}]"))?;
            match parse_printed(&raw) {
                Printed::CharLit('\0') => break,
                Printed::CharLit(c) => text.push(c),
                _ => break,
            }
        }
        Ok(text)
    }

    fn read_object(&mut self, id: &str, size: usize) -> Option<Vec<u8>> {
        let raw = muted_error!(
            self.session.data_evaluate_expression(&format!("&({id})")),
            "object address:"
        )?;
        let addr = match parse_printed(&raw) {
            Printed::Address(addr) => addr,
            _ => return None,
        };
        let read = muted_error!(
            self.session.data_read_memory_bytes(addr, size as u64),
            "object memory:"
        )?;
        Some(read.bytes())
    }
}
