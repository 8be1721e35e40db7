//! The debugger subprocess.

use crate::probe::config::ProbeConfig;
use crate::probe::error::Error;
use crate::probe::mi::transport::PipeTransport;
use crate::{gp_warn, muted_error};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Command, Stdio};
use std::time::Duration;
use timeout_readwrite::TimeoutReader;

/// How long a best-effort stderr drain may block.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Debugger child with redirected stdio. Killed on drop if still alive.
pub struct GdbProcess {
    child: Child,
    stderr: Option<BufReader<TimeoutReader<ChildStderr>>>,
}

impl std::fmt::Debug for GdbProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GdbProcess")
            .field("child", &self.child)
            .finish_non_exhaustive()
    }
}

impl GdbProcess {
    /// Spawn the debugger in MI2 mode over `program`. A start failure is
    /// fatal and reported, never retried.
    pub fn launch(program: &Path, config: &ProbeConfig) -> Result<(Self, PipeTransport), Error> {
        let debugger: PathBuf = match config.debugger.clone() {
            Some(path) => path,
            None => which::which("gdb")?,
        };

        let mut command = Command::new(&debugger);
        command.arg("--interpreter=mi2").arg("--nx");
        command.args(&config.debugger_args);
        if config.program_args.is_empty() {
            command.arg(program);
        } else {
            command.arg("--args").arg(program).args(&config.program_args);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(Error::Launch)?;

        let stdin = child.stdin.take().expect("stdin is piped");
        let stdout = child.stdout.take().expect("stdout is piped");
        let stderr = child.stderr.take().expect("stderr is piped");

        let transport = PipeTransport::new(stdin, stdout, config.timeout());
        let process = Self {
            child,
            stderr: Some(BufReader::new(TimeoutReader::new(
                stderr,
                STDERR_DRAIN_TIMEOUT,
            ))),
        };
        Ok((process, transport))
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Send `SIGINT` to the debugger, the way a console user interrupts a
    /// running target.
    pub fn interrupt(&self) -> Result<(), Error> {
        kill(Pid::from_raw(self.child.id() as i32), Signal::SIGINT)
            .map_err(|e| Error::IO(std::io::Error::from(e)))
    }

    /// Forward whatever accumulated on the debugger's stderr to the log.
    pub fn drain_stderr(&mut self) {
        let Some(reader) = self.stderr.as_mut() else {
            return;
        };
        let mut closed = false;
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => {
                    closed = true;
                    break;
                }
                Ok(_) => gp_warn!(target: "gdb-stderr", "{}", line.trim_end()),
                // a timeout means the pipe is drained for now
                Err(_) => break,
            }
        }
        if closed {
            self.stderr = None;
        }
    }

    /// Kill the subprocess and reap it. Idempotent.
    pub fn terminate(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            muted_error!(self.child.kill(), "kill debugger:");
            muted_error!(self.child.wait(), "reap debugger:");
        }
    }
}

impl Drop for GdbProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}
