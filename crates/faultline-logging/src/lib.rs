//! ---
//! fl_section: "03-persistence-logging"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Structured logging adapters and sinks."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
#![warn(missing_docs)]

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline stderr subscriber for tests and ad-hoc tooling.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
///
/// Every field is optional so the same macros serve the injector (scenario),
/// the healer (command, attempt, category), and the CLI.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Scenario currently executing.
    pub scenario: Option<&'a str>,
    /// Wrapped command line under the auto-healer.
    pub command: Option<&'a str>,
    /// 1-indexed execution attempt.
    pub attempt: Option<u32>,
    /// Failure category label.
    pub category: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a scenario name.
    pub fn with_scenario(mut self, scenario: &'a str) -> Self {
        self.scenario = Some(scenario);
        self
    }

    /// Attach the wrapped command.
    pub fn with_command(mut self, command: &'a str) -> Self {
        self.command = Some(command);
        self
    }

    /// Attach an attempt number.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// Attach a failure category label.
    pub fn with_category(mut self, category: &'a str) -> Self {
        self.category = Some(category);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation degraded but continued (e.g. reduced load, skipped scenario).
    Degraded,
    /// The operation failed or was aborted.
    Fault,
}

impl SystemEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Degraded => "degraded",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event with a success/degraded/fault outcome.
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let default_ctx = LogContext::default();
    let ctx = context.unwrap_or(&default_ctx);
    macro_rules! emit {
        ($level:expr) => {
            tracing::event!(
                $level,
                event,
                outcome = outcome.as_str(),
                scenario = ctx.scenario.unwrap_or(""),
                command = ctx.command.unwrap_or(""),
                attempt = ctx.attempt.unwrap_or_default(),
                category = ctx.category.unwrap_or(""),
                message = %message
            )
        };
    }
    match outcome {
        SystemEventOutcome::Success => emit!(Level::INFO),
        SystemEventOutcome::Degraded => emit!(Level::WARN),
        SystemEventOutcome::Fault => emit!(Level::ERROR),
    }
}
