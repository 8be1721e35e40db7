//! User-supplied breakpoint handlers and their registry.

use crate::probe::frame::Frame;
use std::collections::HashMap;

/// A handler bound to one source location. Registered before the debugger
/// starts; the engine assigns the debugger-side breakpoint number on
/// insertion and dispatches every hit to [`BreakPoint::invoke`].
pub trait BreakPoint {
    /// Where to break: a function name, `file:line` or `*address`.
    fn identifier(&self) -> String;

    /// Optional hit condition, installed together with the breakpoint.
    fn condition(&self) -> Option<String> {
        None
    }

    /// Called for every hit. The frame is valid only until this returns:
    /// retaining it (or touching it from elsewhere) violates the contract.
    fn invoke(&self, frame: &mut Frame<'_>, file: Option<&str>, line: Option<u64>)
        -> anyhow::Result<()>;

    /// Insertion resolved to a single location.
    fn set_at(&self, addr: Option<u64>, file: Option<&str>, line: Option<u64>) {
        let _ = (addr, file, line);
    }

    /// Insertion expanded to several locations (overloads, inlined copies).
    fn set_multiple(&self, addr: Option<u64>, name: &str, count: usize) {
        let _ = (addr, name, count);
    }

    /// Insertion failed; the run continues without this handler.
    fn set_not_found(&self) {}
}

/// Owns the handlers and the `{breakpoint number -> handler}` binding for
/// the lifetime of a run. Read-only during handler invocations.
#[derive(Default)]
pub struct BreakpointRegistry {
    handlers: Vec<Box<dyn BreakPoint>>,
    by_number: HashMap<u32, usize>,
}

impl BreakpointRegistry {
    pub fn add(&mut self, handler: Box<dyn BreakPoint>) {
        self.handlers.push(handler);
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub(crate) fn handler_at(&self, index: usize) -> &dyn BreakPoint {
        self.handlers[index].as_ref()
    }

    /// Bind a debugger-assigned breakpoint number to the handler at `index`.
    pub(crate) fn bind(&mut self, number: u32, index: usize) {
        self.by_number.insert(number, index);
    }

    pub fn handler_by_number(&self, number: u32) -> Option<&dyn BreakPoint> {
        self.by_number
            .get(&number)
            .map(|idx| self.handlers[*idx].as_ref())
    }

    /// Debugger-side number assigned to the handler with `identifier`.
    pub fn number_of(&self, identifier: &str) -> Option<u32> {
        self.by_number
            .iter()
            .find(|(_, idx)| self.handlers[**idx].identifier() == identifier)
            .map(|(number, _)| *number)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Nop(&'static str);

    impl BreakPoint for Nop {
        fn identifier(&self) -> String {
            self.0.to_string()
        }

        fn invoke(
            &self,
            _: &mut Frame<'_>,
            _: Option<&str>,
            _: Option<u64>,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_registry_binding() {
        let mut registry = BreakpointRegistry::default();
        registry.add(Box::new(Nop("main")));
        registry.add(Box::new(Nop("myprog.c:68")));
        registry.bind(1, 0);
        registry.bind(2, 1);
        registry.bind(3, 1);

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.handler_by_number(2).unwrap().identifier(),
            "myprog.c:68"
        );
        assert!(registry.handler_by_number(9).is_none());
        assert_eq!(registry.number_of("main"), Some(1));
        assert_eq!(registry.number_of("missing"), None);
    }
}
