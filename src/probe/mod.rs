//! Probe: the breakpoint-hit dispatch loop.
//!
//! A probe owns the debugger subprocess and the registered breakpoint
//! handlers. [`Probe::run`] drives the whole scheduling loop: read the
//! startup banner, install every handler's breakpoint, start the target and
//! dispatch each stop event to the owning handler until the target exits
//! (or a handler requests completion).

pub mod breakpoint;
pub mod config;
pub mod error;
pub mod frame;
pub mod mi;
pub mod process;

pub use breakpoint::{BreakPoint, BreakpointRegistry};
pub use config::ProbeConfig;
pub use frame::{Frame, Var};

use crate::probe::error::Error;
use crate::probe::mi::types::{StopEvent, StopReason};
use crate::probe::mi::{BreakOptions, Interpreter, PrintValues};
use crate::probe::process::GdbProcess;
use crate::{gp_debug, gp_info, gp_warn, muted_error, weak_error};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;

static BANNER_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"GNU gdb \(([^)]*)\)\s+(\S+)").unwrap());
static BANNER_CONFIG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"configured as "([^"]+)""#).unwrap());

/// Version information extracted from the startup banner, best-effort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BannerInfo {
    /// Plain version number (`12.1`).
    pub version: Option<String>,
    /// Toolset the debugger was shipped with (`GDB`, `Ubuntu 12.1-0ubuntu1`).
    pub toolset: Option<String>,
    /// Configuration triple (`x86_64-linux-gnu`).
    pub configuration: Option<String>,
}

impl BannerInfo {
    fn parse(banner: &str) -> Self {
        let mut info = Self::default();
        if let Some(captures) = BANNER_VERSION.captures(banner) {
            info.toolset = captures.get(1).map(|m| m.as_str().to_string());
            info.version = captures.get(2).map(|m| m.as_str().to_string());
        }
        if let Some(captures) = BANNER_CONFIG.captures(banner) {
            info.configuration = captures.get(1).map(|m| m.as_str().to_string());
        }
        info
    }
}

/// Builder: handlers are registered before the debugger starts.
pub struct ProbeBuilder {
    program: PathBuf,
    config: ProbeConfig,
    breakpoints: BreakpointRegistry,
}

impl ProbeBuilder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            config: ProbeConfig::default(),
            breakpoints: BreakpointRegistry::default(),
        }
    }

    pub fn with_config(mut self, config: ProbeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn register(mut self, handler: Box<dyn BreakPoint>) -> Self {
        self.breakpoints.add(handler);
        self
    }

    /// Spawn the debugger and build the probe around it.
    pub fn launch(self) -> Result<Probe, Error> {
        let (process, transport) = GdbProcess::launch(&self.program, &self.config)?;
        gp_info!(target: "probe", "debugger started, pid {}", process.pid());
        let session = Interpreter::new(Box::new(transport), self.config.timeout());
        Ok(Probe::new(session, Some(process), self.breakpoints, self.config))
    }
}

pub struct Probe {
    session: Interpreter,
    process: Option<GdbProcess>,
    breakpoints: BreakpointRegistry,
    config: ProbeConfig,
    banner: Option<BannerInfo>,
    // names keyed by function address: later hits reuse the first-hit names
    // even after the debugger grows synthetic entry-value arguments
    argument_names: HashMap<u64, Vec<String>>,
}

impl Probe {
    /// Build a probe over an already established session. `process == None`
    /// leaves subprocess handling to the caller.
    pub fn new(
        session: Interpreter,
        process: Option<GdbProcess>,
        breakpoints: BreakpointRegistry,
        config: ProbeConfig,
    ) -> Self {
        Self {
            session,
            process,
            breakpoints,
            config,
            banner: None,
            argument_names: HashMap::new(),
        }
    }

    pub fn banner(&self) -> Option<&BannerInfo> {
        self.banner.as_ref()
    }

    pub fn session(&mut self) -> &mut Interpreter {
        &mut self.session
    }

    /// Run the target to completion and return its exit code.
    pub fn run(&mut self) -> Result<i32, Error> {
        let outcome = self.dispatch();
        self.shutdown(&outcome);
        outcome
    }

    fn dispatch(&mut self) -> Result<i32, Error> {
        let banner = BannerInfo::parse(&self.session.read_banner()?);
        match banner.version.as_deref() {
            Some(version) => gp_info!(target: "probe", "debugger version {version}"),
            None => gp_warn!(target: "probe", "debugger banner not recognized"),
        }
        self.banner = Some(banner);

        self.install_breakpoints()?;

        if let Some(remote) = self.config.remote.clone() {
            self.session.target_select("remote", &[remote.as_str()])?;
        }
        for command in self.config.init_commands.clone() {
            weak_error!(
                self.session.interpreter_exec_console(&command),
                "init command:"
            );
        }
        // a remote target is attached and halted, not started
        if self.config.remote.is_some() {
            self.session.exec_continue()?;
        } else {
            self.session.exec_run()?;
        }

        loop {
            if let Some(process) = self.process.as_mut() {
                process.drain_stderr();
            }
            let stop = self.session.wait_for_stop()?;
            if let Some(code) = stop.target_exit_code() {
                gp_info!(target: "probe", "target exited with code {code}");
                return Ok(code);
            }
            if matches!(stop.reason, Some(StopReason::BreakpointHit)) {
                if self.handle_breakpoint_hit(stop)? {
                    gp_info!(target: "probe", "handler requested completion");
                    return Ok(0);
                }
            } else {
                // documented limitation: only breakpoint stops are dispatched
                gp_warn!(target: "probe", "unhandled stop reason {:?}, resuming", stop.reason);
            }
            self.session.exec_continue()?;
        }
    }

    fn install_breakpoints(&mut self) -> Result<(), Error> {
        for index in 0..self.breakpoints.len() {
            let identifier = self.breakpoints.handler_at(index).identifier();
            let options = BreakOptions {
                condition: self.breakpoints.handler_at(index).condition(),
                ..Default::default()
            };
            match self.session.break_insert(&identifier, &options) {
                Ok(inserted) => {
                    for breakpoint in &inserted {
                        self.breakpoints.bind(breakpoint.number.major, index);
                    }
                    gp_debug!(
                        target: "probe",
                        "breakpoint {} installed at `{identifier}`",
                        inserted[0].number
                    );

                    let handler = self.breakpoints.handler_at(index);
                    if inserted.len() == 1 {
                        let breakpoint = &inserted[0];
                        handler.set_at(
                            breakpoint.addr.and_then(|a| a.at()),
                            breakpoint.file.as_deref(),
                            breakpoint.line,
                        );
                    } else {
                        let locations =
                            inserted.iter().filter(|b| b.number.minor.is_some()).count();
                        let count = if locations > 0 {
                            locations
                        } else {
                            inserted.len()
                        };
                        let addr = inserted.iter().find_map(|b| b.addr.and_then(|a| a.at()));
                        handler.set_multiple(addr, &identifier, count);
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    gp_warn!(target: "probe", "cannot install breakpoint at `{identifier}`: {e}");
                    self.breakpoints.handler_at(index).set_not_found();
                }
            }
        }
        Ok(())
    }

    /// Dispatch one breakpoint hit. Returns true when the handler requested
    /// run completion.
    fn handle_breakpoint_hit(&mut self, stop: StopEvent) -> Result<bool, Error> {
        let Some(number) = stop.bkptno else {
            gp_warn!(target: "probe", "breakpoint stop without a breakpoint number");
            return Ok(false);
        };

        let (file, line, func_addr) = match &stop.frame {
            Some(frame) => (frame.file.clone(), frame.line, frame.addr),
            None => (None, None, None),
        };
        let arguments = match func_addr {
            Some(addr) => self.resolve_arguments(addr)?,
            None => vec![],
        };

        let Some(handler) = self.breakpoints.handler_by_number(number.major) else {
            gp_warn!(target: "probe", "no handler owns breakpoint {number}");
            return Ok(false);
        };

        let mut frame = Frame::new(&mut self.session, &self.breakpoints, &arguments);
        handler
            .invoke(&mut frame, file.as_deref(), line)
            .map_err(Error::Hook)?;
        Ok(frame.exit_requested())
    }

    fn resolve_arguments(&mut self, func_addr: u64) -> Result<Vec<String>, Error> {
        if let Some(names) = self.argument_names.get(&func_addr) {
            return Ok(names.clone());
        }
        let frames = self
            .session
            .stack_list_arguments(PrintValues::No, Some((0, 0)))?;
        let names: Vec<String> = frames
            .first()
            .map(|frame| {
                frame
                    .args
                    .iter()
                    .map(|arg| arg.name.clone())
                    .filter(|name| !name.ends_with("@entry"))
                    .collect()
            })
            .unwrap_or_default();
        self.argument_names.insert(func_addr, names.clone());
        Ok(names)
    }

    fn shutdown(&mut self, outcome: &Result<i32, Error>) {
        let desynchronized = matches!(outcome, Err(e) if e.is_fatal());
        if !desynchronized {
            muted_error!(self.session.gdb_exit(), "debugger exit:");
        }
        if let Some(process) = self.process.as_mut() {
            process.drain_stderr();
            process.terminate();
        }
    }
}
