//! ---
//! fl_section: "07-reporting"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Weekly trend reports over the run history."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Weekly reporter: reads a window of the history store and renders a report
//! with fixed sections. Only `generated_at` differs between two runs over the
//! same window and unchanged history.

use std::path::PathBuf;

pub mod recommend;
pub mod report;
pub mod reporter;

pub use recommend::{recommend, Recommendation, Severity};
pub use report::{
    CategoryHealing, DailyPoint, FailureAnalysis, HealingPerformance, KindSummary, MessageCount,
    ReportWindow, RunSummary, Trend, TrendDirection, WeeklyReport,
};
pub use reporter::{write_report, WeeklyReporter, DEFAULT_LOOKBACK_DAYS};

pub type Result<T> = std::result::Result<T, ReportError>;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("history error: {0}")]
    History(#[from] faultline_history::HistoryError),
    #[error("failed to write report to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("lookback window must be at least one day, got {0}")]
    InvalidLookback(i64),
}
