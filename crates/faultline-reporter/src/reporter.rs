//! ---
//! fl_section: "07-reporting"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Weekly trend reports over the run history."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use faultline_history::HistoryStore;
use serde::Serialize;
use tracing::info;

use crate::recommend::recommend;
use crate::report::{
    FailureAnalysis, HealingPerformance, ReportWindow, RunSummary, Trend, WeeklyReport,
};
use crate::{ReportError, Result};

pub const DEFAULT_LOOKBACK_DAYS: i64 = 7;

/// Builds reports from a caller-supplied history store.
#[derive(Debug)]
pub struct WeeklyReporter<'a> {
    history: &'a HistoryStore,
    lookback_days: i64,
}

impl<'a> WeeklyReporter<'a> {
    pub fn new(history: &'a HistoryStore) -> Self {
        Self {
            history,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }

    pub fn with_lookback_days(mut self, days: i64) -> Result<Self> {
        if days < 1 {
            return Err(ReportError::InvalidLookback(days));
        }
        self.lookback_days = days;
        Ok(self)
    }

    /// Report over `[until - lookback, until)`.
    pub fn generate(&self, until: DateTime<Utc>) -> Result<WeeklyReport> {
        let window = ReportWindow {
            start: until - Duration::days(self.lookback_days),
            end: until,
            lookback_days: self.lookback_days,
        };
        let snapshot = self.history.load_window(window.start, window.end)?;

        let mut runs = snapshot.runs;
        runs.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        let mut failures = snapshot.failures;
        failures.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        let attempts = snapshot.healing_attempts;
        let mut changes = snapshot.manifest_changes;
        changes.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));

        let summary = RunSummary::compute(&runs, &failures, &attempts);
        let trend = Trend::compute(&window, &runs, &failures);
        let failure_analysis = FailureAnalysis::compute(&failures);
        let healing_performance = HealingPerformance::compute(&attempts);
        let recommendations = recommend(
            &summary,
            &trend,
            &failure_analysis,
            &healing_performance,
            &changes,
        );

        info!(
            start = %window.start,
            end = %window.end,
            runs = summary.total_runs,
            failures = summary.total_failures,
            recommendations = recommendations.len(),
            "weekly report generated"
        );
        Ok(WeeklyReport {
            generated_at: Utc::now(),
            window,
            summary,
            trend,
            failure_analysis,
            healing_performance,
            dependency_changes: changes,
            recommendations,
        })
    }

    pub fn generate_now(&self) -> Result<WeeklyReport> {
        self.generate(Utc::now())
    }
}

/// Write `value` as pretty JSON with a trailing newline.
pub fn write_report<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    let mut serialized = serde_json::to_string_pretty(value)?;
    serialized.push('\n');
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| ReportError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }
    fs::write(path, serialized).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!("report written to {}", path.display());
    Ok(())
}
