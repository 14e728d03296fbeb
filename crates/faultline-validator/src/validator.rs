//! ---
//! fl_section: "04-resilience-validation"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Resilience validation against SLO thresholds."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use faultline_common::SloThresholds;
use faultline_injector::{InjectionRun, ProbeSample};
use tracing::{info, warn};

use crate::slo::{self, Mttr};
use crate::verdict::{MetricVerdict, SloMetric, ValidationVerdict};

const DEFAULT_STABILIZATION_SUCCESSES: u32 = 3;

/// Computes SLO metrics for an injection run and compares them to thresholds.
#[derive(Debug, Clone)]
pub struct ResilienceValidator {
    thresholds: SloThresholds,
    stabilization_successes: u32,
}

impl ResilienceValidator {
    pub fn new(thresholds: SloThresholds) -> Self {
        Self {
            thresholds,
            stabilization_successes: DEFAULT_STABILIZATION_SUCCESSES,
        }
    }

    pub fn with_stabilization_successes(mut self, successes: u32) -> Self {
        self.stabilization_successes = successes.max(1);
        self
    }

    pub fn thresholds(&self) -> &SloThresholds {
        &self.thresholds
    }

    /// Evaluate every metric. Never fails: a breached SLO is part of the verdict.
    pub fn validate(&self, run: &InjectionRun) -> ValidationVerdict {
        let t = &self.thresholds;
        let mut warnings = Vec::new();

        // Chaos window: executed scenarios in execution order.
        let chaos: Vec<ProbeSample> = run
            .executed()
            .flat_map(|r| r.probes.iter().cloned())
            .collect();
        let baseline_latencies = slo::successful_latencies(&run.baseline);
        let baseline_median = slo::median(&baseline_latencies);

        let availability = match slo::availability_percent(&chaos) {
            Some(value) => MetricVerdict::at_least(
                SloMetric::Availability,
                value,
                t.min_availability_percent,
            ),
            None => MetricVerdict::at_least(SloMetric::Availability, 100.0, t.min_availability_percent)
                .with_note("no probes in the chaos window"),
        };

        let error_rate = match slo::error_rate_percent(&chaos) {
            Some(value) => {
                MetricVerdict::at_most(SloMetric::ErrorRate, value, t.max_error_rate_percent)
            }
            None => {
                warnings.push("low signal: no requests observed during the chaos window".to_owned());
                MetricVerdict::at_most(SloMetric::ErrorRate, 0.0, t.max_error_rate_percent)
                    .with_note("low signal: zero requests")
            }
        };

        let mttr = match slo::mttr(&chaos, self.stabilization_successes as usize) {
            Mttr::NoFailure => MetricVerdict::at_most(SloMetric::Mttr, 0.0, t.mttr_seconds)
                .with_note("no probe failures"),
            Mttr::Recovered(seconds) => MetricVerdict::at_most(SloMetric::Mttr, seconds, t.mttr_seconds),
            Mttr::Unrecovered(seconds) => MetricVerdict::at_most(SloMetric::Mttr, seconds, t.mttr_seconds)
                .failing(format!(
                    "service never reached {} consecutive successful probes",
                    self.stabilization_successes
                )),
        };

        let chaos_latencies = slo::successful_latencies(&chaos);
        let degradation = match slo::latency_degradation_ms(&chaos_latencies, &baseline_latencies) {
            Some(value) => MetricVerdict::at_most(
                SloMetric::LatencyDegradation,
                value,
                t.max_latency_degradation_ms,
            ),
            None => {
                let note = if baseline_latencies.is_empty() {
                    "no baseline provided"
                } else {
                    "no successful probe latency in the chaos window"
                };
                MetricVerdict::at_most(SloMetric::LatencyDegradation, 0.0, t.max_latency_degradation_ms)
                    .with_note(note)
            }
        };

        let recovery = self.recovery(run, baseline_median);

        let verdict = ValidationVerdict::new(
            Some(run.run_id),
            vec![availability, error_rate, mttr, degradation, recovery],
            warnings,
        );
        if verdict.overall_pass() {
            info!(run_id = %run.run_id, "all SLO metrics passed");
        } else {
            for failed in verdict.failed_metrics() {
                warn!(
                    run_id = %run.run_id,
                    metric = failed.metric.as_str(),
                    actual = failed.actual,
                    threshold = failed.threshold,
                    "SLO metric failed"
                );
            }
        }
        verdict
    }

    /// Worst recovery time across scenarios with a recorded fault removal.
    fn recovery(&self, run: &InjectionRun, baseline_median: Option<f64>) -> MetricVerdict {
        let limit = self.thresholds.max_recovery_seconds;
        let mut worst: Option<f64> = None;
        let mut unrecovered = Vec::new();
        for result in run.executed() {
            let Some(removed_at) = result.fault_removed_at else {
                continue;
            };
            match slo::recovery_seconds(&result.probes, removed_at, baseline_median) {
                Some(seconds) => worst = Some(worst.map_or(seconds, |w: f64| w.max(seconds))),
                None => {
                    let span = result
                        .probes
                        .last()
                        .map(|p| faultline_common::time::seconds_between(removed_at, p.at))
                        .unwrap_or_default();
                    worst = Some(worst.map_or(span, |w: f64| w.max(span)));
                    unrecovered.push(result.scenario_name.clone());
                }
            }
        }
        let verdict = MetricVerdict::at_most(SloMetric::RecoveryTime, worst.unwrap_or(0.0), limit);
        if !unrecovered.is_empty() {
            return verdict.failing(format!(
                "latency never returned within 10% of baseline after: {}",
                unrecovered.join(", ")
            ));
        }
        let verdict = if worst.is_none() {
            verdict.with_note("no scenario recorded a fault removal")
        } else {
            verdict
        };
        if baseline_median.is_none() && worst.is_some() {
            verdict.with_note("no baseline; first successful probe counts as recovered")
        } else {
            verdict
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use faultline_injector::{InjectionResult, Target};
    use url::Url;

    fn sample(t0: DateTime<Utc>, ms: i64, ok: bool, latency: f64) -> ProbeSample {
        let at = t0 + chrono::Duration::milliseconds(ms);
        if ok {
            ProbeSample::ok(at, latency, 200)
        } else {
            ProbeSample::failed(at, latency, "refused")
        }
    }

    fn run_with(probes: Vec<ProbeSample>, baseline: Vec<ProbeSample>, removed_ms: Option<i64>) -> InjectionRun {
        let t0 = probes.first().map(|p| p.at).unwrap_or_else(Utc::now);
        let mut run = InjectionRun::new(Target::new(Url::parse("http://localhost").unwrap()), false);
        run.baseline = baseline;
        let mut result: InjectionResult =
            serde_json::from_value(serde_json::json!({
                "scenario_name": "s",
                "fault_type": "cpu",
                "intensity": "light",
                "started_at": t0,
                "ended_at": t0,
                "outcome": "success",
            }))
            .unwrap();
        result.failed_probes = probes.iter().filter(|p| !p.success).count() as u32;
        result.probes = probes;
        result.fault_removed_at = removed_ms.map(|ms| t0 + chrono::Duration::milliseconds(ms));
        run.results.push(result);
        run
    }

    #[test]
    fn clean_run_passes_every_metric() {
        let t0 = Utc::now();
        let baseline = (0..5).map(|i| sample(t0, i * 100, true, 20.0)).collect();
        let probes = (0..10).map(|i| sample(t0, 1000 + i * 100, true, 21.0)).collect();
        let run = run_with(probes, baseline, Some(1500));
        let verdict = ResilienceValidator::new(SloThresholds::default()).validate(&run);
        assert!(verdict.overall_pass(), "{verdict:?}");
        assert_eq!(verdict.metric(SloMetric::Availability).unwrap().actual, 100.0);
        assert_eq!(verdict.metric(SloMetric::LatencyDegradation).unwrap().actual, 1.0);
        assert_eq!(verdict.metric(SloMetric::Mttr).unwrap().actual, 0.0);
    }

    #[test]
    fn empty_window_is_low_signal_not_failure() {
        let run = run_with(Vec::new(), Vec::new(), None);
        let verdict = ResilienceValidator::new(SloThresholds::default()).validate(&run);
        assert!(verdict.overall_pass());
        assert_eq!(verdict.metric(SloMetric::ErrorRate).unwrap().actual, 0.0);
        assert_eq!(verdict.warnings.len(), 1);
    }

    #[test]
    fn one_failing_metric_fails_overall() {
        let t0 = Utc::now();
        let mut probes = vec![sample(t0, 0, false, 0.0), sample(t0, 1000, false, 0.0)];
        probes.extend((2..60).map(|i| sample(t0, i * 1000, true, 10.0)));
        let run = run_with(probes, Vec::new(), None);
        let thresholds = SloThresholds {
            mttr_seconds: 1.0,
            ..SloThresholds::default()
        };
        let verdict = ResilienceValidator::new(thresholds).validate(&run);
        let mttr = verdict.metric(SloMetric::Mttr).unwrap();
        assert_eq!(mttr.actual, 2.0);
        assert!(!mttr.passed);
        assert!(verdict.metric(SloMetric::Availability).unwrap().passed);
        assert!(!verdict.overall_pass());
    }
}
