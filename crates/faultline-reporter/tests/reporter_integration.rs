//! ---
//! fl_section: "15-testing-qa-runbook"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Integration tests for the weekly reporter."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use chrono::{DateTime, Duration, TimeZone, Utc};
use faultline_common::FailureCategory;
use faultline_history::{
    FailureRecord, HealingAttempt, HealingOutcome, HealingStrategy, HistoryRecord, HistoryStore,
    ManifestChange, RunKind, RunRecord,
};
use faultline_reporter::{write_report, TrendDirection, WeeklyReporter};
use uuid::Uuid;

fn until() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap()
}

fn run(at: DateTime<Utc>, kind: RunKind, success: bool, duration: f64) -> HistoryRecord {
    RunRecord {
        id: Uuid::new_v4(),
        kind,
        subject: "nightly".into(),
        started_at: at,
        finished_at: at + Duration::seconds(duration as i64),
        duration_seconds: duration,
        success,
        status: if success { "success" } else { "retries_exhausted" }.into(),
        attempts: 1,
    }
    .into()
}

fn seeded_store(dir: &std::path::Path) -> HistoryStore {
    let store = HistoryStore::open(dir.join("history.jsonl")).unwrap();
    let day = |d: i64| until() - Duration::days(d);
    let episode = Uuid::new_v4();
    store
        .append_all(vec![
            // Outside the window.
            run(day(9), RunKind::Heal, false, 5.0),
            run(day(6), RunKind::Inject, true, 60.0),
            run(day(5), RunKind::Heal, true, 20.0),
            run(day(2), RunKind::Heal, false, 40.0),
            run(day(1), RunKind::Validate, false, 1.0),
            FailureRecord {
                id: Uuid::new_v4(),
                episode_id: episode,
                category: FailureCategory::Dependency,
                message: "ModuleNotFoundError: No module named 'yaml'".into(),
                timestamp: day(2),
                source_command: "pytest".into(),
                attempt_number: 1,
            }
            .into(),
            HealingAttempt {
                id: Uuid::new_v4(),
                episode_id: episode,
                failure_category: FailureCategory::Dependency,
                strategy: HealingStrategy::InstallDependencies,
                attempt_number: 1,
                outcome: HealingOutcome::Healed,
                duration_seconds: 4.0,
                started_at: day(2),
                detail: None,
            }
            .into(),
            ManifestChange {
                id: Uuid::new_v4(),
                timestamp: day(2),
                manifest: "requirements.txt".into(),
                module: "yaml".into(),
                package: "PyYAML".into(),
                requirement: "PyYAML>=6.0".into(),
                installed: Some(true),
            }
            .into(),
        ])
        .unwrap();
    store
}

#[test]
fn report_covers_only_the_window() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path());
    let report = WeeklyReporter::new(&store).generate(until()).unwrap();

    assert_eq!(report.summary.total_runs, 4);
    assert_eq!(report.summary.successful_runs, 2);
    assert_eq!(report.summary.success_rate_percent, Some(50.0));
    assert_eq!(report.summary.average_duration_seconds, Some(30.25));
    assert_eq!(report.trend.daily.len(), 7);
    assert_eq!(report.trend.direction, TrendDirection::Declining);
    assert_eq!(report.failure_analysis.top_category, Some(FailureCategory::Dependency));
    let dependency = &report.healing_performance.by_category[&FailureCategory::Dependency];
    assert_eq!(dependency.healed, 1);
    assert_eq!(report.dependency_changes.len(), 1);
    let rules: Vec<_> = report.recommendations.iter().map(|r| r.rule).collect();
    assert_eq!(rules, vec!["low-success-rate", "declining-trend", "dependency-drift"]);
}

#[test]
fn rerun_over_unchanged_history_is_identical_except_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path());
    let reporter = WeeklyReporter::new(&store);

    let first = reporter.generate(until()).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = reporter.generate(until()).unwrap();
    assert_eq!(first.sections_json().unwrap(), second.sections_json().unwrap());

    let a = dir.path().join("a.json");
    let b = dir.path().join("b.json");
    write_report(&a, &first.sections_json().unwrap()).unwrap();
    write_report(&b, &second.sections_json().unwrap()).unwrap();
    assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
}

#[test]
fn imported_records_are_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path());
    let export = dir.path().join("export.json");
    let snapshot = store.load().unwrap();
    std::fs::write(&export, serde_json::to_string(&snapshot).unwrap()).unwrap();

    let other = HistoryStore::open(dir.path().join("other.jsonl")).unwrap();
    let first = other.import(&export).unwrap();
    assert_eq!(first.imported, snapshot.len());
    let again = other.import(&export).unwrap();
    assert_eq!(again.imported, 0);
    assert_eq!(again.skipped, snapshot.len());

    let report = WeeklyReporter::new(&other)
        .with_lookback_days(30)
        .unwrap()
        .generate(until())
        .unwrap();
    assert_eq!(report.summary.total_runs, 5);
}
