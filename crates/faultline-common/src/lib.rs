//! ---
//! fl_section: "01-core-functionality"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Shared primitives and utilities for the faultline toolkit."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Core shared primitives for the faultline workspace.
//! This crate exposes the scenario configuration document, tool configuration,
//! the error taxonomy, tracing initialisation, and cancellation helpers consumed
//! across the workspace.

pub mod config;
pub mod error;
pub mod lock;
pub mod logging;
pub mod shutdown;
pub mod time;

pub use config::{
    AbortConditions, FaultFamily, FaultType, FaultlineConfig, HealerSettings, HistoryConfig,
    Intensity, LoggingConfig, ProbeConfig, ScenarioDocument, ScenarioParameters, ScenarioSpec,
    SentinelSettings, SloThresholds, ThresholdsDocument, WorkerLimits,
};
pub use error::{FailureCategory, FaultlineError, Result};
pub use lock::AdvisoryLock;
pub use logging::{init_tracing, LogFormat};
pub use shutdown::{install_shutdown_handler, CancellationToken};
