//! ---
//! fl_section: "03-persistence-logging"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Persistence abstractions for the run history."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::fmt;

use chrono::{DateTime, Utc};
use faultline_common::FailureCategory;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which tool produced a run record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Inject,
    Validate,
    Heal,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Inject => "inject",
            RunKind::Validate => "validate",
            RunKind::Heal => "heal",
        }
    }
}

/// One completed (or interrupted) invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub kind: RunKind,
    /// Command line, configuration path, or results path the run operated on.
    pub subject: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub success: bool,
    /// Tool-specific terminal status (`completed`, `terminal_failure`, `fail`, ...).
    pub status: String,
    /// Command executions (heal) or scenarios executed (inject).
    #[serde(default)]
    pub attempts: u32,
}

/// Captured failure of a wrapped command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub id: Uuid,
    /// Groups every failure and healing attempt of one wrapped execution.
    pub episode_id: Uuid,
    pub category: FailureCategory,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub source_command: String,
    pub attempt_number: u32,
}

/// Remediation applied before a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealingStrategy {
    /// Dependency sentinel in fix + install mode.
    InstallDependencies,
    /// Exponential backoff with health re-probing.
    HealthBackoff,
    /// No automated fix; surfaced to an operator.
    ManualIntervention,
    /// Short wait for the target to settle.
    StabilizationWait,
    /// Plain backoff wait.
    Backoff,
}

impl HealingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealingStrategy::InstallDependencies => "install_dependencies",
            HealingStrategy::HealthBackoff => "health_backoff",
            HealingStrategy::ManualIntervention => "manual_intervention",
            HealingStrategy::StabilizationWait => "stabilization_wait",
            HealingStrategy::Backoff => "backoff",
        }
    }
}

impl fmt::Display for HealingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealingOutcome {
    Healed,
    NotHealed,
}

impl HealingOutcome {
    pub fn is_healed(&self) -> bool {
        matches!(self, HealingOutcome::Healed)
    }
}

/// One healing action and the fate of the retry that followed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealingAttempt {
    pub id: Uuid,
    pub episode_id: Uuid,
    pub failure_category: FailureCategory,
    pub strategy: HealingStrategy,
    /// Strictly increasing within an episode, starting at 1.
    pub attempt_number: u32,
    pub outcome: HealingOutcome,
    pub duration_seconds: f64,
    pub started_at: DateTime<Utc>,
    /// Free-form remediation detail (packages installed, probe result, ...).
    #[serde(default)]
    pub detail: Option<String>,
}

/// One line appended to a dependency manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestChange {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub manifest: String,
    /// Import name that triggered the addition.
    pub module: String,
    pub package: String,
    /// Exact line appended to the manifest.
    pub requirement: String,
    /// Installer outcome when install mode ran.
    #[serde(default)]
    pub installed: Option<bool>,
}

/// Tagged record as persisted in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "collection", content = "data", rename_all = "snake_case")]
pub enum HistoryRecord {
    Run(RunRecord),
    Failure(FailureRecord),
    HealingAttempt(HealingAttempt),
    ManifestChange(ManifestChange),
}

impl HistoryRecord {
    pub fn id(&self) -> Uuid {
        match self {
            HistoryRecord::Run(r) => r.id,
            HistoryRecord::Failure(r) => r.id,
            HistoryRecord::HealingAttempt(r) => r.id,
            HistoryRecord::ManifestChange(r) => r.id,
        }
    }

    /// Timestamp used for windowed reads.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            HistoryRecord::Run(r) => r.started_at,
            HistoryRecord::Failure(r) => r.timestamp,
            HistoryRecord::HealingAttempt(r) => r.started_at,
            HistoryRecord::ManifestChange(r) => r.timestamp,
        }
    }

    pub fn collection(&self) -> &'static str {
        match self {
            HistoryRecord::Run(_) => "runs",
            HistoryRecord::Failure(_) => "failures",
            HistoryRecord::HealingAttempt(_) => "healing_attempts",
            HistoryRecord::ManifestChange(_) => "manifest_changes",
        }
    }
}

impl From<RunRecord> for HistoryRecord {
    fn from(value: RunRecord) -> Self {
        HistoryRecord::Run(value)
    }
}

impl From<FailureRecord> for HistoryRecord {
    fn from(value: FailureRecord) -> Self {
        HistoryRecord::Failure(value)
    }
}

impl From<HealingAttempt> for HistoryRecord {
    fn from(value: HealingAttempt) -> Self {
        HistoryRecord::HealingAttempt(value)
    }
}

impl From<ManifestChange> for HistoryRecord {
    fn from(value: ManifestChange) -> Self {
        HistoryRecord::ManifestChange(value)
    }
}

/// Records grouped by collection, in append order. Also the import/export format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    #[serde(default)]
    pub runs: Vec<RunRecord>,
    #[serde(default)]
    pub failures: Vec<FailureRecord>,
    #[serde(default)]
    pub healing_attempts: Vec<HealingAttempt>,
    #[serde(default)]
    pub manifest_changes: Vec<ManifestChange>,
}

impl HistorySnapshot {
    pub fn push(&mut self, record: HistoryRecord) {
        match record {
            HistoryRecord::Run(r) => self.runs.push(r),
            HistoryRecord::Failure(r) => self.failures.push(r),
            HistoryRecord::HealingAttempt(r) => self.healing_attempts.push(r),
            HistoryRecord::ManifestChange(r) => self.manifest_changes.push(r),
        }
    }

    pub fn len(&self) -> usize {
        self.runs.len()
            + self.failures.len()
            + self.healing_attempts.len()
            + self.manifest_changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten back into tagged records, collection by collection.
    pub fn into_records(self) -> Vec<HistoryRecord> {
        let mut records = Vec::with_capacity(self.len());
        records.extend(self.runs.into_iter().map(HistoryRecord::from));
        records.extend(self.failures.into_iter().map(HistoryRecord::from));
        records.extend(self.healing_attempts.into_iter().map(HistoryRecord::from));
        records.extend(self.manifest_changes.into_iter().map(HistoryRecord::from));
        records
    }
}
