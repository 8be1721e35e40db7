//! Byte-stream seam between the session and the debugger subprocess.
//!
//! The session talks to a [`Transport`] so the protocol engine stays
//! independent from process plumbing. The production transport wraps the
//! child's pipes; reads are armed with a timeout so a stalled debugger
//! surfaces as [`std::io::ErrorKind::TimedOut`] instead of hanging forever.

use std::io::{self, BufRead, BufReader, Write};
use std::process::{ChildStdin, ChildStdout};
use std::time::Duration;
use timeout_readwrite::TimeoutReader;

pub trait Transport {
    /// Write one command line; the terminator is appended here.
    fn send_line(&mut self, line: &str) -> io::Result<()>;

    /// Read one line with terminators stripped. Empty lines are skipped.
    fn recv_line(&mut self) -> io::Result<String>;
}

pub struct PipeTransport {
    writer: ChildStdin,
    reader: BufReader<TimeoutReader<ChildStdout>>,
}

impl std::fmt::Debug for PipeTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeTransport").finish_non_exhaustive()
    }
}

impl PipeTransport {
    pub fn new(stdin: ChildStdin, stdout: ChildStdout, timeout: Duration) -> Self {
        Self {
            writer: stdin,
            reader: BufReader::new(TimeoutReader::new(stdout, timeout)),
        }
    }
}

impl Transport for PipeTransport {
    fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    fn recv_line(&mut self) -> io::Result<String> {
        // a line ends with `\r`, `\n` or `\r\n`; treating both bytes as
        // terminators and skipping empty lines covers all three without
        // peeking past a lone `\r` (peeking could block until the timeout)
        loop {
            let mut line = Vec::new();
            loop {
                let (advance, done) = {
                    let available = self.reader.fill_buf()?;
                    if available.is_empty() {
                        return Err(io::ErrorKind::UnexpectedEof.into());
                    }
                    match available.iter().position(|b| *b == b'\n' || *b == b'\r') {
                        Some(pos) => {
                            line.extend_from_slice(&available[..pos]);
                            (pos + 1, true)
                        }
                        None => {
                            line.extend_from_slice(available);
                            (available.len(), false)
                        }
                    }
                };
                self.reader.consume(advance);
                if done {
                    break;
                }
            }
            if !line.is_empty() {
                return String::from_utf8(line)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
            }
        }
    }
}
