//! ---
//! fl_section: "04-resilience-validation"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Resilience validation against SLO thresholds."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Resilience validator.
//!
//! A failing SLO is data: [`ResilienceValidator::validate`] always returns a
//! verdict, and only [`enforce`] in [`Enforcement::FailOnViolation`] mode turns
//! a failing verdict into an error.

pub mod slo;
pub mod validator;
pub mod verdict;

pub use validator::ResilienceValidator;
pub use verdict::{enforce, Comparison, Enforcement, MetricVerdict, SloMetric, SloViolation, ValidationVerdict};
