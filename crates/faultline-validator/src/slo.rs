//! ---
//! fl_section: "04-resilience-validation"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Resilience validation against SLO thresholds."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Pure SLO arithmetic over ordered probe samples.

use chrono::{DateTime, Utc};
use faultline_common::time::seconds_between;
use faultline_injector::ProbeSample;

/// Recovery is reached once latency is back within this factor of the baseline median.
pub const RECOVERY_LATENCY_FACTOR: f64 = 1.1;

/// Median of `values`; `None` when empty.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Latencies of successful probes.
pub fn successful_latencies(samples: &[ProbeSample]) -> Vec<f64> {
    samples
        .iter()
        .filter(|s| s.success)
        .map(|s| s.latency_ms)
        .collect()
}

/// `100 * successful / total`; `None` when there are no probes.
pub fn availability_percent(samples: &[ProbeSample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let ok = samples.iter().filter(|s| s.success).count();
    Some(100.0 * ok as f64 / samples.len() as f64)
}

/// `100 * failed / total`; `None` when there were no requests.
pub fn error_rate_percent(samples: &[ProbeSample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let failed = samples.iter().filter(|s| !s.success).count();
    Some(100.0 * failed as f64 / samples.len() as f64)
}

/// Outcome of the MTTR scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mttr {
    /// No probe failed.
    NoFailure,
    /// Seconds from first failure to the start of the stabilizing run.
    Recovered(f64),
    /// Never stabilized; seconds from first failure to the last probe.
    Unrecovered(f64),
}

/// Time from the first failed probe to the first probe of the first run of
/// `required` consecutive successes after it.
pub fn mttr(samples: &[ProbeSample], required: usize) -> Mttr {
    let required = required.max(1);
    let Some(first_failure) = samples.iter().position(|s| !s.success) else {
        return Mttr::NoFailure;
    };
    let failed_at = samples[first_failure].at;
    let mut streak = 0usize;
    for (offset, sample) in samples[first_failure..].iter().enumerate() {
        if sample.success {
            streak += 1;
            if streak >= required {
                let start = first_failure + offset + 1 - streak;
                return Mttr::Recovered(seconds_between(failed_at, samples[start].at));
            }
        } else {
            streak = 0;
        }
    }
    let last = samples.last().map_or(failed_at, |s| s.at);
    Mttr::Unrecovered(seconds_between(failed_at, last))
}

/// `max(0, median(chaos) - median(baseline))`; `None` without a baseline or chaos latency.
pub fn latency_degradation_ms(chaos: &[f64], baseline: &[f64]) -> Option<f64> {
    let baseline = median(baseline)?;
    let chaos = median(chaos)?;
    Some((chaos - baseline).max(0.0))
}

/// Seconds from `removed_at` to the first successful probe whose latency is within
/// [`RECOVERY_LATENCY_FACTOR`] of `baseline_median`. Without a baseline the first
/// successful probe counts.
pub fn recovery_seconds(
    samples: &[ProbeSample],
    removed_at: DateTime<Utc>,
    baseline_median: Option<f64>,
) -> Option<f64> {
    let ceiling = baseline_median.map(|m| m * RECOVERY_LATENCY_FACTOR);
    samples
        .iter()
        .filter(|s| s.at >= removed_at && s.success)
        .find(|s| ceiling.map_or(true, |c| s.latency_ms <= c))
        .map(|s| seconds_between(removed_at, s.at))
}
