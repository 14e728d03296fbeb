//! ---
//! fl_section: "07-reporting"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Weekly trend reports over the run history."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Fixed recommendation rules evaluated over a computed report.

use faultline_common::FailureCategory;
use faultline_history::ManifestChange;
use serde::Serialize;

use crate::report::{FailureAnalysis, HealingPerformance, RunSummary, Trend, TrendDirection};

pub const SUCCESS_RATE_FLOOR_PERCENT: f64 = 90.0;
pub const SUCCESS_RATE_CRITICAL_PERCENT: f64 = 50.0;
pub const HEALING_RATE_FLOOR_PERCENT: f64 = 50.0;
/// Attempts needed before a category's healing rate is judged.
pub const HEALING_MIN_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub rule: &'static str,
    pub severity: Severity,
    pub message: String,
}

impl Recommendation {
    fn new(rule: &'static str, severity: Severity, message: String) -> Self {
        Self {
            rule,
            severity,
            message,
        }
    }
}

/// Evaluate every rule in a fixed order.
pub fn recommend(
    summary: &RunSummary,
    trend: &Trend,
    failures: &FailureAnalysis,
    healing: &HealingPerformance,
    changes: &[ManifestChange],
) -> Vec<Recommendation> {
    let mut out = Vec::new();

    match summary.success_rate_percent {
        None => out.push(Recommendation::new(
            "no-runs",
            Severity::Info,
            "no runs recorded in the window; confirm scheduled chaos and validation jobs are running"
                .to_owned(),
        )),
        Some(rate) if rate < SUCCESS_RATE_FLOOR_PERCENT => {
            let severity = if rate < SUCCESS_RATE_CRITICAL_PERCENT {
                Severity::Critical
            } else {
                Severity::Warning
            };
            let focus = match failures.top_category {
                Some(category) => format!(
                    "review top failure category '{}' ({} failure(s))",
                    category,
                    failures.count(category)
                ),
                None => "review failing runs; no failure records were captured".to_owned(),
            };
            out.push(Recommendation::new(
                "low-success-rate",
                severity,
                format!(
                    "run success rate {rate:.2}% is below {SUCCESS_RATE_FLOOR_PERCENT:.0}%: {focus}"
                ),
            ));
        }
        Some(_) => {}
    }

    if trend.direction == TrendDirection::Declining {
        out.push(Recommendation::new(
            "declining-trend",
            Severity::Warning,
            format!(
                "success rate fell from {:.2}% to {:.2}% across the window",
                trend.first_half_success_rate_percent.unwrap_or_default(),
                trend.second_half_success_rate_percent.unwrap_or_default()
            ),
        ));
    }

    for (category, stats) in &healing.by_category {
        if stats.attempts < HEALING_MIN_ATTEMPTS {
            continue;
        }
        if let Some(rate) = stats.success_rate_percent {
            if rate < HEALING_RATE_FLOOR_PERCENT {
                out.push(Recommendation::new(
                    "ineffective-healing",
                    Severity::Warning,
                    format!(
                        "healing for '{category}' succeeded in {rate:.2}% of {} attempt(s); revisit its remediation",
                        stats.attempts
                    ),
                ));
            }
        }
    }

    let manual = failures.count(FailureCategory::Configuration);
    if manual > 0 {
        out.push(Recommendation::new(
            "manual-intervention",
            Severity::Warning,
            format!("{manual} configuration failure(s) required manual intervention; fix the affected documents"),
        ));
    }

    if !changes.is_empty() {
        let mut packages: Vec<&str> = changes.iter().map(|c| c.package.as_str()).collect();
        packages.sort_unstable();
        packages.dedup();
        let failed_installs = changes.iter().filter(|c| c.installed == Some(false)).count();
        let severity = if failed_installs > 0 {
            Severity::Warning
        } else {
            Severity::Info
        };
        out.push(Recommendation::new(
            "dependency-drift",
            severity,
            format!(
                "{} package(s) added to manifests automatically ({}); pin versions and review{}",
                packages.len(),
                packages.join(", "),
                if failed_installs > 0 {
                    format!("; {failed_installs} install(s) failed")
                } else {
                    String::new()
                }
            ),
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn summary(rate: Option<f64>) -> RunSummary {
        RunSummary {
            total_runs: 10,
            successful_runs: 0,
            success_rate_percent: rate,
            average_duration_seconds: None,
            runs_by_kind: BTreeMap::new(),
            total_failures: 0,
            total_healing_attempts: 0,
            healed_attempts: 0,
        }
    }

    fn stable() -> Trend {
        Trend {
            daily: Vec::new(),
            first_half_success_rate_percent: None,
            second_half_success_rate_percent: None,
            direction: TrendDirection::Stable,
        }
    }

    #[test]
    fn low_success_rate_points_at_top_category() {
        let failures = FailureAnalysis::compute(&[]);
        let healing = HealingPerformance::compute(&[]);
        let recs = recommend(&summary(Some(40.0)), &stable(), &failures, &healing, &[]);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].rule, "low-success-rate");
        assert_eq!(recs[0].severity, Severity::Critical);
    }

    #[test]
    fn healthy_window_has_no_recommendations() {
        let failures = FailureAnalysis::compute(&[]);
        let healing = HealingPerformance::compute(&[]);
        let recs = recommend(&summary(Some(100.0)), &stable(), &failures, &healing, &[]);
        assert!(recs.is_empty());
        let none = recommend(&summary(None), &stable(), &failures, &healing, &[]);
        assert_eq!(none[0].rule, "no-runs");
    }
}
