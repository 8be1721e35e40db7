//! Probe configuration.

use crate::probe::error::Error;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Knobs of a probe run. Loadable from a TOML file, every field has a
/// usable default.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Debugger binary. `None` means look `gdb` up in `PATH`.
    pub debugger: Option<PathBuf>,
    /// Extra arguments for the debugger invocation.
    pub debugger_args: Vec<String>,
    /// Arguments passed to the target program.
    pub program_args: Vec<String>,
    /// Watchdog timeout, milliseconds. The session is torn down when the
    /// debugger stays silent for this long.
    pub timeout_ms: u64,
    /// Remote target endpoint (`host:port` or a serial device). When set the
    /// run starts with an attach and `exec-continue` instead of `exec-run`.
    pub remote: Option<String>,
    /// CLI commands executed through the console interpreter right after
    /// the run starts.
    pub init_commands: Vec<String>,
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            debugger: None,
            debugger_args: vec![],
            program_args: vec![],
            timeout_ms: default_timeout_ms(),
            remote: None,
            init_commands: vec![],
        }
    }
}

impl ProbeConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let raw = fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProbeConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert!(config.debugger.is_none());
        assert!(config.init_commands.is_empty());
    }

    #[test]
    fn test_parse_toml() {
        let config: ProbeConfig = toml::from_str(
            r#"
            debugger = "/usr/bin/gdb-multiarch"
            timeout_ms = 30000
            remote = "localhost:3333"
            init_commands = ["monitor reset halt", "load"]
            "#,
        )
        .unwrap();
        assert_eq!(
            config.debugger.as_deref(),
            Some(Path::new("/usr/bin/gdb-multiarch"))
        );
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.remote.as_deref(), Some("localhost:3333"));
        assert_eq!(config.init_commands.len(), 2);
    }

    #[test]
    fn test_unknown_field_is_tolerated() {
        // configs travel between harness versions
        let config: ProbeConfig = toml::from_str("future_knob = true").unwrap();
        assert_eq!(config.timeout_ms, 10_000);
    }
}
