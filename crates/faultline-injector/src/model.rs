//! ---
//! fl_section: "02-fault-injection"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Fault injection engine and capability adapters."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use faultline_common::{FaultType, FaultlineError, Intensity, Result};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Service under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Base URL the health path is resolved against.
    pub base_url: Url,
    /// Process handle used by `process_crash` scenarios.
    #[serde(default)]
    pub process_id: Option<u32>,
}

impl Target {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            process_id: None,
        }
    }

    pub fn with_process_id(mut self, pid: Option<u32>) -> Self {
        self.process_id = pid;
        self
    }
}

/// One health probe against the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSample {
    pub at: DateTime<Utc>,
    pub success: bool,
    pub latency_ms: f64,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProbeSample {
    pub fn ok(at: DateTime<Utc>, latency_ms: f64, status: u16) -> Self {
        Self {
            at,
            success: true,
            latency_ms,
            status: Some(status),
            error: None,
        }
    }

    pub fn failed(at: DateTime<Utc>, latency_ms: f64, error: impl Into<String>) -> Self {
        Self {
            at,
            success: false,
            latency_ms,
            status: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionOutcome {
    Success,
    Failure,
    Skipped,
}

impl InjectionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            InjectionOutcome::Success => "success",
            InjectionOutcome::Failure => "failure",
            InjectionOutcome::Skipped => "skipped",
        }
    }
}

/// Record of one executed (or skipped) scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectionResult {
    pub scenario_name: String,
    pub fault_type: FaultType,
    pub intensity: Intensity,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Instant the fault was lifted; recovery is measured from here.
    #[serde(default)]
    pub fault_removed_at: Option<DateTime<Utc>>,
    pub outcome: InjectionOutcome,
    /// Probes taken while the fault was active and during the recovery window.
    #[serde(default)]
    pub probes: Vec<ProbeSample>,
    #[serde(default)]
    pub failed_probes: u32,
    #[serde(default)]
    pub error_detail: Option<String>,
    /// Time from fault removal until the service stabilized, when observed.
    #[serde(default)]
    pub time_to_recovery_seconds: Option<f64>,
    /// Workers actually running for resource scenarios.
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl InjectionResult {
    pub(crate) fn begin(
        scenario_name: &str,
        fault_type: FaultType,
        intensity: Intensity,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            scenario_name: scenario_name.to_owned(),
            fault_type,
            intensity,
            started_at,
            ended_at: started_at,
            fault_removed_at: None,
            outcome: InjectionOutcome::Skipped,
            probes: Vec::new(),
            failed_probes: 0,
            error_detail: None,
            time_to_recovery_seconds: None,
            workers: None,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn succeed(&mut self) {
        self.outcome = InjectionOutcome::Success;
        self.error_detail = None;
        self.ended_at = Utc::now();
    }

    /// Mark the result failed. A failure always carries a non-empty detail.
    pub(crate) fn fail(&mut self, detail: impl Into<String>) {
        let detail = detail.into();
        self.outcome = InjectionOutcome::Failure;
        self.error_detail = Some(if detail.trim().is_empty() {
            "unspecified injection failure".to_owned()
        } else {
            detail
        });
        self.ended_at = Utc::now();
    }

    pub(crate) fn skip(&mut self, note: impl Into<String>) {
        self.outcome = InjectionOutcome::Skipped;
        self.warnings.push(note.into());
        self.ended_at = Utc::now();
    }

    pub(crate) fn extend_probes(&mut self, samples: impl IntoIterator<Item = ProbeSample>) {
        for sample in samples {
            if !sample.success {
                self.failed_probes += 1;
            }
            self.probes.push(sample);
        }
    }

    /// Latency of successful probes, in milliseconds.
    pub fn latency_samples(&self) -> Vec<f64> {
        self.probes
            .iter()
            .filter(|p| p.success)
            .map(|p| p.latency_ms)
            .collect()
    }

    pub fn duration_seconds(&self) -> f64 {
        faultline_common::time::seconds_between(self.started_at, self.ended_at)
    }
}

/// Terminal status of an injection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// Abort conditions skipped the remaining scenarios.
    PartiallyComplete,
    /// A cancellation signal stopped the run.
    Interrupted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::PartiallyComplete => "partially_complete",
            RunStatus::Interrupted => "interrupted",
        }
    }
}

/// Results document written by `inject` and consumed by `validate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectionRun {
    pub run_id: Uuid,
    pub target: Target,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    #[serde(default)]
    pub abort_reason: Option<String>,
    /// Probes collected before the first fault.
    #[serde(default)]
    pub baseline: Vec<ProbeSample>,
    #[serde(default)]
    pub results: Vec<InjectionResult>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl InjectionRun {
    pub fn new(target: Target, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            target,
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Completed,
            abort_reason: None,
            baseline: Vec::new(),
            results: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn executed(&self) -> impl Iterator<Item = &InjectionResult> {
        self.results
            .iter()
            .filter(|r| r.outcome != InjectionOutcome::Skipped)
    }

    pub fn count(&self, outcome: InjectionOutcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    /// Reject documents whose failed results carry no error detail.
    pub fn validate(&self) -> Result<()> {
        for result in &self.results {
            if result.outcome == InjectionOutcome::Failure
                && result
                    .error_detail
                    .as_deref()
                    .map_or(true, |d| d.trim().is_empty())
            {
                return Err(FaultlineError::configuration(format!(
                    "failed scenario '{}' has no error detail",
                    result.scenario_name
                )));
            }
        }
        Ok(())
    }

    /// Load a results document written by a previous run.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|err| {
            FaultlineError::configuration(format!("unable to read {}: {}", path.display(), err))
        })?;
        let run: InjectionRun = serde_json::from_str(&contents).map_err(|err| {
            FaultlineError::configuration(format!(
                "malformed results document {}: {}",
                path.display(),
                err
            ))
        })?;
        run.validate()?;
        Ok(run)
    }

    /// Persist the document atomically so partial flushes never leave torn JSON.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let body = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}
