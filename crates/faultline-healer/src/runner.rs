//! ---
//! fl_section: "05-self-healing"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Auto-healer: failure classification, remediation, bounded retries."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use faultline_common::{CancellationToken, FaultlineError, Result};
use serde::Serialize;
use tokio::process::Command;
use tracing::debug;

/// Captured result of one command execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl CommandOutput {
    pub fn succeeded(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
            duration: Duration::ZERO,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stderr followed by stdout; classification runs over both.
    pub fn combined(&self) -> String {
        match (self.stderr.trim().is_empty(), self.stdout.trim().is_empty()) {
            (false, false) => format!("{}\n{}", self.stderr.trim_end(), self.stdout.trim_end()),
            (false, true) => self.stderr.trim_end().to_owned(),
            (true, false) => self.stdout.trim_end().to_owned(),
            (true, true) => match self.exit_code {
                Some(code) => format!("command exited with status {code}"),
                None => "command terminated by signal".to_owned(),
            },
        }
    }

    /// Last non-empty line of the combined output.
    pub fn last_error_line(&self) -> String {
        let stderr_line = self.stderr.lines().rev().find(|l| !l.trim().is_empty());
        let stdout_line = self.stdout.lines().rev().find(|l| !l.trim().is_empty());
        match stderr_line.or(stdout_line) {
            Some(line) => line.trim().to_owned(),
            None => self.combined(),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}

/// Executes the wrapped command.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, token: &CancellationToken) -> Result<CommandOutput>;
}

/// Runs commands through `sh -c`, killing the child on cancellation.
#[derive(Debug, Clone)]
pub struct ShellCommandRunner {
    shell: String,
}

impl ShellCommandRunner {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_owned(),
        }
    }

    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(&self, command: &str, token: &CancellationToken) -> Result<CommandOutput> {
        debug!(shell = %self.shell, command, "spawning wrapped command");
        let started = Instant::now();
        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                FaultlineError::Io(std::io::Error::new(
                    err.kind(),
                    format!("failed to spawn '{command}': {err}"),
                ))
            })?;
        let output = tokio::select! {
            output = child.wait_with_output() => output?,
            _ = token.cancelled() => return Err(FaultlineError::Interrupted),
        };
        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_exit_code_and_streams() {
        let runner = ShellCommandRunner::new();
        let token = CancellationToken::new();
        let output = runner
            .run("echo out; echo 'No module named yaml' >&2; exit 3", &token)
            .await
            .unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.last_error_line(), "No module named yaml");
        assert_eq!(output.combined(), "No module named yaml\nout");
    }

    #[tokio::test]
    async fn cancellation_interrupts_long_commands() {
        let runner = ShellCommandRunner::new();
        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });
        let started = Instant::now();
        let result = runner.run("sleep 30", &token).await;
        assert!(matches!(result, Err(FaultlineError::Interrupted)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn empty_output_describes_status() {
        let output = CommandOutput::failed(2, "");
        assert_eq!(output.combined(), "command exited with status 2");
    }
}
