//! ---
//! fl_section: "07-reporting"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Weekly trend reports over the run history."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use faultline_common::FailureCategory;
use faultline_history::{FailureRecord, HealingAttempt, ManifestChange, RunRecord};
use indexmap::IndexMap;
use serde::Serialize;

use crate::recommend::Recommendation;

/// Half-window success rates must differ by more than this to call a direction.
const TREND_TOLERANCE_PERCENT: f64 = 5.0;
const TOP_MESSAGES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub lookback_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindSummary {
    pub total: usize,
    pub successful: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub total_runs: usize,
    pub successful_runs: usize,
    pub success_rate_percent: Option<f64>,
    pub average_duration_seconds: Option<f64>,
    pub runs_by_kind: BTreeMap<String, KindSummary>,
    pub total_failures: usize,
    pub total_healing_attempts: usize,
    pub healed_attempts: usize,
}

impl RunSummary {
    pub(crate) fn compute(
        runs: &[RunRecord],
        failures: &[FailureRecord],
        attempts: &[HealingAttempt],
    ) -> Self {
        let successful_runs = runs.iter().filter(|r| r.success).count();
        let mut runs_by_kind: BTreeMap<String, KindSummary> = BTreeMap::new();
        for run in runs {
            let entry = runs_by_kind.entry(run.kind.as_str().to_owned()).or_insert(KindSummary {
                total: 0,
                successful: 0,
            });
            entry.total += 1;
            if run.success {
                entry.successful += 1;
            }
        }
        let total_duration: f64 = runs.iter().map(|r| r.duration_seconds).sum();
        Self {
            total_runs: runs.len(),
            successful_runs,
            success_rate_percent: percent(successful_runs, runs.len()),
            average_duration_seconds: (!runs.is_empty())
                .then(|| round2(total_duration / runs.len() as f64)),
            runs_by_kind,
            total_failures: failures.len(),
            total_healing_attempts: attempts.len(),
            healed_attempts: attempts.iter().filter(|a| a.outcome.is_healed()).count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub runs: usize,
    pub successful_runs: usize,
    pub success_rate_percent: Option<f64>,
    pub failures: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    /// One point per UTC day in the window, empty days included.
    pub daily: Vec<DailyPoint>,
    pub first_half_success_rate_percent: Option<f64>,
    pub second_half_success_rate_percent: Option<f64>,
    pub direction: TrendDirection,
}

impl Trend {
    pub(crate) fn compute(
        window: &ReportWindow,
        runs: &[RunRecord],
        failures: &[FailureRecord],
    ) -> Self {
        let mut days: BTreeMap<NaiveDate, (usize, usize, usize)> = BTreeMap::new();
        let first_day = window.start.date_naive();
        let last_day = (window.end - Duration::nanoseconds(1)).date_naive();
        let mut day = first_day;
        while day <= last_day {
            days.insert(day, (0, 0, 0));
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        for run in runs {
            let entry = days.entry(run.started_at.date_naive()).or_default();
            entry.0 += 1;
            if run.success {
                entry.1 += 1;
            }
        }
        for failure in failures {
            days.entry(failure.timestamp.date_naive()).or_default().2 += 1;
        }
        let daily = days
            .into_iter()
            .map(|(date, (runs, successful_runs, failures))| DailyPoint {
                date,
                runs,
                successful_runs,
                success_rate_percent: percent(successful_runs, runs),
                failures,
            })
            .collect();

        let midpoint = window.start + (window.end - window.start) / 2;
        let (early, late): (Vec<&RunRecord>, Vec<&RunRecord>) =
            runs.iter().partition(|r| r.started_at < midpoint);
        let rate = |set: &[&RunRecord]| percent(set.iter().filter(|r| r.success).count(), set.len());
        let first = rate(early.as_slice());
        let second = rate(late.as_slice());
        let direction = match (first, second) {
            (Some(a), Some(b)) if b - a > TREND_TOLERANCE_PERCENT => TrendDirection::Improving,
            (Some(a), Some(b)) if a - b > TREND_TOLERANCE_PERCENT => TrendDirection::Declining,
            (Some(_), Some(_)) => TrendDirection::Stable,
            _ => TrendDirection::InsufficientData,
        };
        Self {
            daily,
            first_half_success_rate_percent: first,
            second_half_success_rate_percent: second,
            direction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageCount {
    pub message: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureAnalysis {
    /// Every category, in classification order.
    pub by_category: IndexMap<FailureCategory, usize>,
    pub top_category: Option<FailureCategory>,
    pub top_messages: Vec<MessageCount>,
}

impl FailureAnalysis {
    pub(crate) fn compute(failures: &[FailureRecord]) -> Self {
        let mut by_category: IndexMap<FailureCategory, usize> =
            FailureCategory::ALL.into_iter().map(|c| (c, 0)).collect();
        let mut messages: BTreeMap<String, usize> = BTreeMap::new();
        for failure in failures {
            *by_category.entry(failure.category).or_default() += 1;
            *messages.entry(headline(&failure.message)).or_default() += 1;
        }
        // Ties resolve to the earlier category in classification order.
        let top_category = by_category
            .iter()
            .filter(|(_, count)| **count > 0)
            .fold(None, |best: Option<(FailureCategory, usize)>, (category, count)| match best {
                Some((_, best_count)) if best_count >= *count => best,
                _ => Some((*category, *count)),
            })
            .map(|(category, _)| category);
        let mut top_messages: Vec<MessageCount> = messages
            .into_iter()
            .map(|(message, count)| MessageCount { message, count })
            .collect();
        top_messages.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.message.cmp(&b.message)));
        top_messages.truncate(TOP_MESSAGES);
        Self {
            by_category,
            top_category,
            top_messages,
        }
    }

    pub fn count(&self, category: FailureCategory) -> usize {
        self.by_category.get(&category).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryHealing {
    pub attempts: usize,
    pub healed: usize,
    pub success_rate_percent: Option<f64>,
    pub average_duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealingPerformance {
    pub by_category: IndexMap<FailureCategory, CategoryHealing>,
    pub by_strategy: BTreeMap<String, usize>,
    pub overall_success_rate_percent: Option<f64>,
}

impl HealingPerformance {
    pub(crate) fn compute(attempts: &[HealingAttempt]) -> Self {
        let mut by_category = IndexMap::new();
        for category in FailureCategory::ALL {
            let of_category: Vec<&HealingAttempt> = attempts
                .iter()
                .filter(|a| a.failure_category == category)
                .collect();
            let healed = of_category.iter().filter(|a| a.outcome.is_healed()).count();
            let total_duration: f64 = of_category.iter().map(|a| a.duration_seconds).sum();
            by_category.insert(
                category,
                CategoryHealing {
                    attempts: of_category.len(),
                    healed,
                    success_rate_percent: percent(healed, of_category.len()),
                    average_duration_seconds: (!of_category.is_empty())
                        .then(|| round2(total_duration / of_category.len() as f64)),
                },
            );
        }
        let mut by_strategy = BTreeMap::new();
        for attempt in attempts {
            *by_strategy
                .entry(attempt.strategy.as_str().to_owned())
                .or_default() += 1;
        }
        let healed = attempts.iter().filter(|a| a.outcome.is_healed()).count();
        Self {
            by_category,
            by_strategy,
            overall_success_rate_percent: percent(healed, attempts.len()),
        }
    }
}

/// The rendered report. Field order is the section order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyReport {
    pub generated_at: DateTime<Utc>,
    pub window: ReportWindow,
    pub summary: RunSummary,
    pub trend: Trend,
    pub failure_analysis: FailureAnalysis,
    pub healing_performance: HealingPerformance,
    pub dependency_changes: Vec<ManifestChange>,
    pub recommendations: Vec<Recommendation>,
}

impl WeeklyReport {
    /// Everything except `generated_at`, for comparing two renderings.
    pub fn sections_json(&self) -> serde_json::Result<serde_json::Value> {
        let mut value = serde_json::to_value(self)?;
        if let Some(object) = value.as_object_mut() {
            object.remove("generated_at");
        }
        Ok(value)
    }
}

pub(crate) fn percent(part: usize, total: usize) -> Option<f64> {
    (total > 0).then(|| round2(100.0 * part as f64 / total as f64))
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// First line of a failure message, trimmed to a stable grouping key.
fn headline(message: &str) -> String {
    let line = message
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");
    line.chars().take(160).collect()
}
