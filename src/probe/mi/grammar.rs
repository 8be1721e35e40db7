//! Grammar of a single MI2 output line.
//!
//! Line shapes (stream, async and result records, the `(gdb)` terminal
//! marker) and the recursive value grammar live here; keyword validation and
//! continuation-entry resolution are done by [`super::output::parse_line`].

use crate::probe::mi::output::{AsyncKind, StreamChannel, StreamRecord};
use crate::probe::mi::value::{Fields, List, Tuple, Value};
use chumsky::error::Rich;
use chumsky::prelude::*;
use chumsky::{extra, text, Parser};

type Err<'a> = extra::Err<Rich<'a, char>>;

/// Parse product before keyword validation.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum RawOutput {
    Prompt,
    Stream(StreamRecord),
    Async {
        token: Option<u64>,
        kind: AsyncKind,
        class: String,
        fields: Fields,
    },
    Result {
        token: Option<u64>,
        class: String,
        fields: Vec<(Option<String>, Value)>,
    },
}

/// C-style quoted string with an escape alphabet; unknown escapes keep the
/// escaped character.
fn c_string<'a>() -> impl Parser<'a, &'a str, String, Err<'a>> + Clone {
    let escape = just('\\').ignore_then(choice((
        just('\\').to('\\'),
        just('"').to('"'),
        just('n').to('\n'),
        just('t').to('\t'),
        just('r').to('\r'),
        just('f').to('\u{000c}'),
        just('0').to('\0'),
        any(),
    )));
    let plain = any().filter(|c: &char| *c != '"' && *c != '\\');

    plain
        .or(escape)
        .repeated()
        .collect::<String>()
        .delimited_by(just('"'), just('"'))
        .labelled("quoted string")
}

/// Field and class names: `bkpt`, `thread-groups`, `breakpoint-hit`, …
fn name<'a>() -> impl Parser<'a, &'a str, String, Err<'a>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .repeated()
        .at_least(1)
        .to_slice()
        .map(|s: &str| s.to_string())
        .labelled("name")
}

/// Command token: plain decimal digits. 19 digits always fit a u64.
fn token<'a>() -> impl Parser<'a, &'a str, u64, Err<'a>> + Clone {
    text::digits(10)
        .at_least(1)
        .at_most(19)
        .to_slice()
        .map(|s: &str| s.parse::<u64>().unwrap())
        .labelled("token")
}

pub(super) fn value<'a>() -> impl Parser<'a, &'a str, Value, Err<'a>> + Clone {
    recursive(|value| {
        let string = c_string().map(Value::Str);

        let field = name()
            .then_ignore(just('='))
            .then(value.clone())
            .labelled("field");

        let tuple = field
            .clone()
            .separated_by(just(','))
            .collect::<Vec<_>>()
            .delimited_by(just('{'), just('}'))
            .map(|fields| Value::Tuple(Tuple(Fields::new(fields))))
            .labelled("tuple");

        let results = field
            .separated_by(just(','))
            .at_least(1)
            .collect::<Vec<_>>()
            .map(|fields| List::Results(Fields::new(fields)));
        let values = value
            .separated_by(just(','))
            .at_least(1)
            .collect::<Vec<_>>()
            .map(List::Values);
        let list = choice((results, values))
            .or_not()
            .map(|body| body.unwrap_or(List::Empty))
            .delimited_by(just('['), just(']'))
            .map(Value::List)
            .labelled("list");

        choice((string, tuple, list))
    })
}

fn stream<'a>() -> impl Parser<'a, &'a str, RawOutput, Err<'a>> {
    let channel = choice((
        just('~').to(StreamChannel::Console),
        just('@').to(StreamChannel::Target),
        just('&').to(StreamChannel::Log),
    ));

    channel
        .then(c_string())
        .map(|(channel, text)| RawOutput::Stream(StreamRecord { channel, text }))
        .labelled("stream record")
}

fn async_record<'a>() -> impl Parser<'a, &'a str, RawOutput, Err<'a>> {
    let kind = choice((
        just('*').to(AsyncKind::Exec),
        just('+').to(AsyncKind::Status),
        just('=').to(AsyncKind::Notify),
    ));
    let field = name().then_ignore(just('=')).then(value());

    token()
        .or_not()
        .then(kind)
        .then(name())
        .then(
            just(',')
                .ignore_then(field)
                .repeated()
                .collect::<Vec<_>>(),
        )
        .map(|(((token, kind), class), fields)| RawOutput::Async {
            token,
            kind,
            class,
            fields: Fields::new(fields),
        })
        .labelled("async record")
}

fn result_record<'a>() -> impl Parser<'a, &'a str, RawOutput, Err<'a>> {
    // entries after the first may be anonymous and inherit the preceding name
    let entry = name()
        .then_ignore(just('='))
        .then(value())
        .map(|(name, value)| (Some(name), value))
        .or(value().map(|value| (None, value)));

    token()
        .or_not()
        .then_ignore(just('^'))
        .then(name())
        .then(
            just(',')
                .ignore_then(entry)
                .repeated()
                .collect::<Vec<_>>(),
        )
        .map(|((token, class), fields)| RawOutput::Result {
            token,
            class,
            fields,
        })
        .labelled("result record")
}

fn prompt<'a>() -> impl Parser<'a, &'a str, RawOutput, Err<'a>> {
    just("(gdb)").padded().to(RawOutput::Prompt)
}

pub(super) fn line<'a>() -> impl Parser<'a, &'a str, RawOutput, Err<'a>> {
    choice((prompt(), stream(), async_record(), result_record())).then_ignore(end())
}
