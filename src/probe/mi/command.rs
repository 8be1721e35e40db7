//! Outgoing command lines.
//!
//! A command renders as `<token>-<operation>[ <options>][ --][ <parameters>]`.
//! Rendering is deterministic: options keep insertion order and any parameter
//! containing whitespace (or quoting characters) is wrapped in double quotes.

use itertools::Itertools;
use std::fmt::Display;

#[derive(Debug, Clone)]
pub struct MiCommand {
    operation: &'static str,
    options: Vec<String>,
    parameters: Vec<String>,
}

impl MiCommand {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            options: vec![],
            parameters: vec![],
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Append a dash-option (`-t`, `-c <cond>`, …).
    pub fn opt(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    /// Append a dash-option with an argument.
    pub fn opt_with(mut self, option: &str, value: impl Display) -> Self {
        self.options.push(format!("{option} {}", quote(&value.to_string())));
        self
    }

    pub fn param(mut self, parameter: impl Display) -> Self {
        self.parameters.push(parameter.to_string());
        self
    }

    pub fn params<I: IntoIterator<Item = P>, P: Display>(mut self, parameters: I) -> Self {
        self.parameters
            .extend(parameters.into_iter().map(|p| p.to_string()));
        self
    }

    /// Render the full command line for `token`, without the terminator.
    pub fn render(&self, token: u64) -> String {
        let mut line = format!("{token}-{}", self.operation);
        if !self.options.is_empty() {
            line.push(' ');
            line.push_str(&self.options.iter().join(" "));
        }
        if !self.parameters.is_empty() {
            if !self.options.is_empty() {
                line.push_str(" --");
            }
            line.push(' ');
            line.push_str(&self.parameters.iter().map(|p| quote(p)).join(" "));
        }
        line
    }
}

fn quote(parameter: &str) -> String {
    let plain = !parameter.is_empty()
        && !parameter
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\\');
    if plain {
        return parameter.to_string();
    }

    let mut quoted = String::with_capacity(parameter.len() + 2);
    quoted.push('"');
    for c in parameter.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
