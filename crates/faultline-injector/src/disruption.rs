//! ---
//! fl_section: "02-fault-injection"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Fault injection engine and capability adapters."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Process disruption: signal delivery and service stop/start commands.

use async_trait::async_trait;
use faultline_common::{FaultlineError, Result};
use tokio::process::Command;
use tracing::{debug, info};

#[async_trait]
pub trait ProcessDisruptor: Send + Sync {
    /// Deliver `signal` (e.g. `TERM`, `KILL`) to `pid`.
    async fn signal(&self, pid: u32, signal: &str) -> Result<()>;

    /// Run an operator-supplied shell command (restart, stop, start).
    async fn run_command(&self, command: &str) -> Result<()>;
}

/// Uses `kill` and `sh -c` on the local host.
#[derive(Debug, Clone, Default)]
pub struct ShellDisruptor;

impl ShellDisruptor {
    pub fn new() -> Self {
        Self
    }
}

fn normalize_signal(signal: &str) -> String {
    let trimmed = signal.trim();
    trimmed
        .strip_prefix("SIG")
        .unwrap_or(trimmed)
        .to_ascii_uppercase()
}

#[async_trait]
impl ProcessDisruptor for ShellDisruptor {
    async fn signal(&self, pid: u32, signal: &str) -> Result<()> {
        let signal = normalize_signal(signal);
        info!(pid, signal = %signal, "delivering signal");
        let output = Command::new("kill")
            .arg("-s")
            .arg(&signal)
            .arg(pid.to_string())
            .output()
            .await
            .map_err(|err| FaultlineError::injection(format!("failed to run kill: {}", err)))?;
        if !output.status.success() {
            return Err(FaultlineError::injection(format!(
                "kill -s {} {} failed: {}",
                signal,
                pid,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn run_command(&self, command: &str) -> Result<()> {
        debug!(command, "running disruption command");
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .map_err(|err| {
                FaultlineError::injection(format!("failed to spawn '{}': {}", command, err))
            })?;
        if !output.status.success() {
            return Err(FaultlineError::injection(format!(
                "'{}' exited with {}: {}",
                command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_names_are_normalized() {
        assert_eq!(normalize_signal("SIGTERM"), "TERM");
        assert_eq!(normalize_signal(" kill "), "KILL");
    }

    #[tokio::test]
    async fn failing_commands_surface_as_injection_errors() {
        let disruptor = ShellDisruptor::new();
        disruptor.run_command("true").await.unwrap();
        let err = disruptor.run_command("echo boom >&2; exit 3").await.unwrap_err();
        assert!(matches!(err, FaultlineError::Injection(ref msg) if msg.contains("boom")));
    }
}
