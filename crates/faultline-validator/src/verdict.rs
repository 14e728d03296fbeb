//! ---
//! fl_section: "04-resilience-validation"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Resilience validation against SLO thresholds."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SloMetric {
    Availability,
    ErrorRate,
    Mttr,
    LatencyDegradation,
    RecoveryTime,
}

impl SloMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            SloMetric::Availability => "availability",
            SloMetric::ErrorRate => "error_rate",
            SloMetric::Mttr => "mttr",
            SloMetric::LatencyDegradation => "latency_degradation",
            SloMetric::RecoveryTime => "recovery_time",
        }
    }
}

impl fmt::Display for SloMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an actual value is compared against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    AtMost,
    AtLeast,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricVerdict {
    pub metric: SloMetric,
    pub actual: f64,
    pub threshold: f64,
    pub comparison: Comparison,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl MetricVerdict {
    pub fn at_most(metric: SloMetric, actual: f64, threshold: f64) -> Self {
        Self {
            metric,
            actual,
            threshold,
            comparison: Comparison::AtMost,
            passed: actual <= threshold,
            note: None,
        }
    }

    pub fn at_least(metric: SloMetric, actual: f64, threshold: f64) -> Self {
        Self {
            metric,
            actual,
            threshold,
            comparison: Comparison::AtLeast,
            passed: actual >= threshold,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Force a failure regardless of the comparison (e.g. never recovered).
    pub fn failing(mut self, note: impl Into<String>) -> Self {
        self.passed = false;
        self.note = Some(note.into());
        self
    }
}

/// Per-metric results plus the overall AND.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationVerdict {
    pub run_id: Option<Uuid>,
    pub evaluated_at: DateTime<Utc>,
    pub metrics: Vec<MetricVerdict>,
    overall_pass: bool,
    /// Low-signal conditions that do not fail the verdict on their own.
    pub warnings: Vec<String>,
}

impl ValidationVerdict {
    pub fn new(run_id: Option<Uuid>, metrics: Vec<MetricVerdict>, warnings: Vec<String>) -> Self {
        let overall_pass = metrics.iter().all(|m| m.passed);
        Self {
            run_id,
            evaluated_at: Utc::now(),
            metrics,
            overall_pass,
            warnings,
        }
    }

    pub fn overall_pass(&self) -> bool {
        self.overall_pass
    }

    pub fn metric(&self, metric: SloMetric) -> Option<&MetricVerdict> {
        self.metrics.iter().find(|m| m.metric == metric)
    }

    pub fn failed_metrics(&self) -> impl Iterator<Item = &MetricVerdict> {
        self.metrics.iter().filter(|m| !m.passed)
    }
}

/// What the caller wants done with a failing verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Enforcement {
    /// Return the verdict for inspection.
    #[default]
    Report,
    /// Surface a failing verdict as [`SloViolation`].
    FailOnViolation,
}

/// A failing verdict raised under [`Enforcement::FailOnViolation`].
#[derive(Debug, thiserror::Error)]
#[error("SLO violation: {}", failed_names(.verdict))]
pub struct SloViolation {
    pub verdict: ValidationVerdict,
}

fn failed_names(verdict: &ValidationVerdict) -> String {
    verdict
        .failed_metrics()
        .map(|m| format!("{} ({} vs {})", m.metric, m.actual, m.threshold))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn enforce(
    verdict: ValidationVerdict,
    mode: Enforcement,
) -> Result<ValidationVerdict, SloViolation> {
    match mode {
        Enforcement::FailOnViolation if !verdict.overall_pass() => Err(SloViolation { verdict }),
        _ => Ok(verdict),
    }
}
