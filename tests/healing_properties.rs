//! ---
//! fl_section: "15-testing-qa-runbook"
//! fl_subsection: "integration-tests"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Cross-crate properties of recovery measurement and the auto-healer."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use faultline_common::{CancellationToken, FailureCategory};
use faultline_healer::testing::{RecordingFixer, ScriptedRunner};
use faultline_healer::{AutoHealer, BackoffSchedule, CommandOutput, HealerPolicy, HealerState};
use faultline_history::{HealingStrategy, HistoryStore};
use faultline_injector::ProbeSample;
use faultline_validator::slo::{mttr, Mttr};

fn fast_policy(max_retries: u32) -> HealerPolicy {
    HealerPolicy {
        max_retries,
        retry_delay: Duration::from_millis(1),
        retry_step_cap: Duration::from_millis(2),
        health_backoff: BackoffSchedule::new(
            Duration::from_millis(1),
            Duration::from_millis(2),
            Duration::from_millis(8),
        ),
        stabilization_wait: Duration::from_millis(1),
        jitter: Duration::ZERO,
    }
}

#[test]
fn mttr_equals_the_span_of_consecutive_failures() {
    let t0 = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
    let step = chrono::Duration::milliseconds(500);
    for healthy_prefix in 0..3 {
        for k in 1..=8 {
            let mut samples = Vec::new();
            let mut at = t0;
            for _ in 0..healthy_prefix {
                samples.push(ProbeSample::ok(at, 10.0, 200));
                at += step;
            }
            let first_failure = at;
            for _ in 0..k {
                samples.push(ProbeSample::failed(at, 1000.0, "connection refused"));
                at += step;
            }
            let recovered_at = at;
            for _ in 0..3 {
                samples.push(ProbeSample::ok(at, 10.0, 200));
                at += step;
            }

            let expected = (recovered_at - first_failure).num_milliseconds() as f64 / 1000.0;
            assert_eq!(mttr(&samples, 3), Mttr::Recovered(expected), "k={k}");
        }
    }
}

#[tokio::test]
async fn two_dependency_failures_then_success_heals_in_two_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let history = HistoryStore::open(dir.path().join("history.jsonl")).unwrap();
    let runner = Arc::new(ScriptedRunner::new([
        CommandOutput::failed(1, "ModuleNotFoundError: No module named 'requests'"),
        CommandOutput::failed(1, "ImportError: No module named yaml"),
        CommandOutput::succeeded("ok"),
    ]));
    let fixer = Arc::new(RecordingFixer::default());
    let healer = AutoHealer::new(runner.clone(), fast_policy(3))
        .with_dependency_fixer(fixer.clone())
        .with_history(&history);

    let report = healer
        .execute("python ingest.py", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.final_state, HealerState::Success);
    assert_eq!(runner.calls(), 3);
    assert_eq!(fixer.calls(), 2);
    assert_eq!(report.attempts.len(), 2);
    assert!(report.attempts.iter().all(|a| {
        a.failure_category == FailureCategory::Dependency
            && a.strategy == HealingStrategy::InstallDependencies
    }));

    let snapshot = history.load().unwrap();
    assert_eq!(snapshot.healing_attempts.len(), 2);
    assert_eq!(snapshot.failures.len(), 2);
    assert!(snapshot.runs[0].success);
}

#[tokio::test]
async fn configuration_failure_stops_without_retrying() {
    let runner = Arc::new(ScriptedRunner::repeating(CommandOutput::failed(
        2,
        "FileNotFoundError: [Errno 2] No such file or directory: 'chaos.toml'",
    )));
    let healer = AutoHealer::new(runner.clone(), fast_policy(5));

    let report = healer
        .execute("faultlinectl inject --config chaos.toml", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.final_state, HealerState::TerminalFailure);
    assert_eq!(runner.calls(), 1);
    assert_eq!(report.attempts.len(), 1);
    assert_eq!(report.attempts[0].strategy, HealingStrategy::ManualIntervention);
    let err = report.terminal_error().unwrap();
    assert_eq!(err.category(), FailureCategory::Configuration);
}
