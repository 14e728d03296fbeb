//! ---
//! fl_section: "01-core-functionality"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Shared primitives and utilities for the faultline toolkit."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Result alias used by crates that surface [`FaultlineError`].
pub type Result<T> = std::result::Result<T, FaultlineError>;

/// Error taxonomy shared by the injector, healer, and CLI.
///
/// SLO breaches are deliberately absent: a failing verdict is data, not an error.
#[derive(Debug, thiserror::Error)]
pub enum FaultlineError {
    /// Malformed scenario or threshold document. Fatal, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Unresolved import detected in the wrapped workload.
    #[error("dependency error: {0}")]
    Dependency(String),
    /// Probe failure or timeout against the target health endpoint.
    #[error("health check error: {0}")]
    HealthCheck(String),
    /// Fault application failed.
    #[error("injection error: {0}")]
    Injection(String),
    /// Retries exhausted; carries the attempt count and last raw error text.
    #[error("terminal failure [{category}] after {attempts} attempt(s): {last_error}")]
    TerminalFailure {
        /// Category of the final failure.
        category: FailureCategory,
        /// Raw error text captured from the final attempt.
        last_error: String,
        /// Number of command executions performed.
        attempts: u32,
    },
    /// A cooperative cancellation signal interrupted the operation.
    #[error("operation interrupted by cancellation signal")]
    Interrupted,
    /// Wrapper for IO errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON encode/decode errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FaultlineError {
    /// Build a configuration error from any displayable message.
    pub fn configuration(message: impl fmt::Display) -> Self {
        Self::Configuration(message.to_string())
    }

    /// Build an injection error from any displayable message.
    pub fn injection(message: impl fmt::Display) -> Self {
        Self::Injection(message.to_string())
    }

    /// Map the error onto the failure category used for healing decisions.
    pub fn category(&self) -> FailureCategory {
        match self {
            FaultlineError::Configuration(_) => FailureCategory::Configuration,
            FaultlineError::Dependency(_) => FailureCategory::Dependency,
            FaultlineError::HealthCheck(_) => FailureCategory::HealthCheck,
            FaultlineError::Injection(_) => FailureCategory::Injection,
            FaultlineError::TerminalFailure { category, .. } => *category,
            FaultlineError::Interrupted
            | FaultlineError::Io(_)
            | FaultlineError::Serialization(_) => FailureCategory::Generic,
        }
    }

    /// Whether the error class can be remediated by an automated retry.
    pub fn is_healable(&self) -> bool {
        matches!(
            self,
            FaultlineError::Dependency(_)
                | FaultlineError::HealthCheck(_)
                | FaultlineError::Injection(_)
        )
    }
}

/// Classification assigned to a failed command execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Import or module resolution failure.
    Dependency,
    /// Missing file or unparsable configuration.
    Configuration,
    /// Connection refused, timeout, or non-2xx from a health endpoint.
    HealthCheck,
    /// Scenario-specific fault injection failure.
    Injection,
    /// Anything the rule list did not recognise.
    Generic,
}

impl FailureCategory {
    /// All categories in rule evaluation order.
    pub const ALL: [FailureCategory; 5] = [
        FailureCategory::Dependency,
        FailureCategory::Configuration,
        FailureCategory::HealthCheck,
        FailureCategory::Injection,
        FailureCategory::Generic,
    ];

    /// Static label for metrics, logs, and persisted records.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Dependency => "dependency",
            FailureCategory::Configuration => "configuration",
            FailureCategory::HealthCheck => "health_check",
            FailureCategory::Injection => "injection",
            FailureCategory::Generic => "generic",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        FailureCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown failure category: {}", s))
    }
}
