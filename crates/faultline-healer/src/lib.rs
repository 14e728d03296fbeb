//! ---
//! fl_section: "05-self-healing"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Auto-healer: failure classification, remediation, bounded retries."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Auto-healer.
//!
//! Wraps one command at a time in a classify-heal-retry loop. Failures are
//! classified by an ordered rule list over the captured output, a
//! category-specific remediation runs (and is logged) before every retry, and
//! every failure and healing attempt lands in the history store when one is
//! attached.

pub mod backoff;
pub mod healer;
pub mod remedy;
pub mod rules;
pub mod runner;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backoff::BackoffSchedule;
pub use healer::{
    AutoHealer, HealerPolicy, HealerState, HealingReport, StateTransition, TerminalReason,
};
pub use remedy::{DependencyFix, DependencyFixer, SentinelFixer};
pub use rules::{classify, strategy_for, ClassificationRule, RULES};
pub use runner::{CommandOutput, CommandRunner, ShellCommandRunner};
