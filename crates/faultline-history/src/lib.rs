//! ---
//! fl_section: "03-persistence-logging"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Persistence abstractions for the run history."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Append-only history shared by the auto-healer, the injector CLI, and the
//! weekly reporter. Callers construct a [`HistoryStore`] and pass it by reference.

/// Result alias used throughout the history crate.
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Error type for the history store.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// Wrapper for IO errors encountered while reading/writing the store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON serialization issues.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// The first line of the file is not a history header.
    #[error("{0} is not a faultline history file")]
    InvalidHeader(String),
    /// The file was written by a newer format version.
    #[error("unsupported history format version {0}")]
    UnsupportedVersion(u16),
}

pub mod records;
pub mod store;

pub use records::{
    FailureRecord, HealingAttempt, HealingOutcome, HealingStrategy, HistoryRecord,
    HistorySnapshot, ManifestChange, RunKind, RunRecord,
};
pub use store::{HistoryStore, ImportSummary, HISTORY_FORMAT_VERSION};
