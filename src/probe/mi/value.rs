//! Structured values of the MI2 output grammar.
//!
//! Every payload a debugger line carries reduces to a [`Value`]: a c-string,
//! a tuple of named values or a list. Field names inside a tuple are not
//! necessarily unique, the wire order is preserved.

use crate::probe::error::Error;
use std::fmt;

/// Ordered sequence of named values.
///
/// Used for tuple bodies, result-record payloads and async-record payloads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fields(Vec<(String, Value)>);

impl Fields {
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        Self(fields)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.0.iter()
    }

    /// Return the first value stored under `name`, if any.
    pub fn find_opt(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Return the first value stored under `name` or a [`Error::MissingField`].
    pub fn find(&self, name: &'static str) -> Result<&Value, Error> {
        self.find_opt(name).ok_or(Error::MissingField(name))
    }

    /// All values stored under `name`, in wire order. Duplicate names are legal
    /// (continuation entries of a result record inherit their predecessor's name).
    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.0.iter().filter(move |(n, _)| n == name).map(|(_, v)| v)
    }
}

impl From<Vec<(String, Value)>> for Fields {
    fn from(fields: Vec<(String, Value)>) -> Self {
        Self(fields)
    }
}

impl FromIterator<(String, Value)> for Fields {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Fields {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A single value of the wire grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Tuple(Tuple),
    List(List),
}

/// `{name=value,…}` aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tuple(pub Fields);

/// `[…]` sequence. An empty list is indistinguishable between the two
/// populated shapes, so it keeps its own variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum List {
    Empty,
    Values(Vec<Value>),
    Results(Fields),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Tuple(_) => "tuple",
            Value::List(_) => "list",
        }
    }

    pub fn expect_str(&self) -> Result<&str, Error> {
        match self {
            Value::Str(s) => Ok(s),
            _ => Err(Error::WrongVariant {
                expected: "string",
                got: self.kind(),
            }),
        }
    }

    pub fn expect_tuple(&self) -> Result<&Tuple, Error> {
        match self {
            Value::Tuple(t) => Ok(t),
            _ => Err(Error::WrongVariant {
                expected: "tuple",
                got: self.kind(),
            }),
        }
    }

    pub fn expect_list(&self) -> Result<&List, Error> {
        match self {
            Value::List(l) => Ok(l),
            _ => Err(Error::WrongVariant {
                expected: "list",
                got: self.kind(),
            }),
        }
    }
}

/// Escape a string for the wire: the inverse of the grammar's c-string rules.
pub(super) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "\"{}\"", escape(s)),
            Value::Tuple(t) => t.fmt(f),
            Value::List(l) => l.fmt(f),
        }
    }
}

fn write_fields(f: &mut fmt::Formatter<'_>, fields: &Fields) -> fmt::Result {
    for (i, (name, value)) in fields.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{name}={value}")?;
    }
    Ok(())
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        write_fields(f, &self.0)?;
        f.write_str("}")
    }
}

impl fmt::Display for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        match self {
            List::Empty => {}
            List::Values(values) => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    value.fmt(f)?;
                }
            }
            List::Results(fields) => write_fields(f, fields)?,
        }
        f.write_str("]")
    }
}
