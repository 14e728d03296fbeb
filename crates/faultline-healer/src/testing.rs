//! ---
//! fl_section: "05-self-healing"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Auto-healer: failure classification, remediation, bounded retries."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Deterministic runners and fixers for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use faultline_common::{CancellationToken, FaultlineError, Result};
use parking_lot::Mutex;

use crate::remedy::{DependencyFix, DependencyFixer};
use crate::runner::{CommandOutput, CommandRunner};

/// Returns scripted outputs in order, then repeats the last one.
#[derive(Debug)]
pub struct ScriptedRunner {
    script: Mutex<VecDeque<CommandOutput>>,
    last: Mutex<Option<CommandOutput>>,
    commands: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new(script: impl IntoIterator<Item = CommandOutput>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(None),
            commands: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn repeating(output: CommandOutput) -> Self {
        Self::new([output])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &str, token: &CancellationToken) -> Result<CommandOutput> {
        if token.is_cancelled() {
            return Err(FaultlineError::Interrupted);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.commands.lock().push(command.to_owned());
        let next = self.script.lock().pop_front();
        let mut last = self.last.lock();
        match next {
            Some(output) => {
                *last = Some(output.clone());
                Ok(output)
            }
            None => Ok(last
                .clone()
                .unwrap_or_else(|| CommandOutput::failed(1, "script exhausted"))),
        }
    }
}

/// Counts invocations and reports a fixed detail.
#[derive(Debug, Default)]
pub struct RecordingFixer {
    calls: AtomicUsize,
}

impl RecordingFixer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DependencyFixer for RecordingFixer {
    async fn fix(&self) -> Result<DependencyFix> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(DependencyFix {
            detail: format!("recorded fix #{call}"),
            manifest_changes: Vec::new(),
        })
    }
}
