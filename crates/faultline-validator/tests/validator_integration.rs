//! ---
//! fl_section: "15-testing-qa-runbook"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Integration tests for the resilience validator."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use faultline_common::SloThresholds;
use faultline_injector::InjectionRun;
use faultline_validator::{enforce, Enforcement, ResilienceValidator, SloMetric};

const RESULTS: &str = r#"{
  "run_id": "6f1c7a52-5d7e-4a3b-9a4e-0c3f0c7e9d11",
  "target": { "base_url": "http://127.0.0.1:8080/", "process_id": null },
  "dry_run": false,
  "started_at": "2026-10-12T10:00:00Z",
  "finished_at": "2026-10-12T10:01:00Z",
  "status": "completed",
  "baseline": [
    { "at": "2026-10-12T10:00:00Z", "success": true, "latency_ms": 40.0 },
    { "at": "2026-10-12T10:00:01Z", "success": true, "latency_ms": 50.0 },
    { "at": "2026-10-12T10:00:02Z", "success": true, "latency_ms": 60.0 }
  ],
  "results": [
    {
      "scenario_name": "crash",
      "fault_type": "process_crash",
      "intensity": "light",
      "started_at": "2026-10-12T10:00:05Z",
      "ended_at": "2026-10-12T10:00:20Z",
      "fault_removed_at": "2026-10-12T10:00:05Z",
      "outcome": "success",
      "failed_probes": 2,
      "probes": [
        { "at": "2026-10-12T10:00:06Z", "success": false, "latency_ms": 5000.0, "error": "refused" },
        { "at": "2026-10-12T10:00:07Z", "success": false, "latency_ms": 5000.0, "error": "refused" },
        { "at": "2026-10-12T10:00:08Z", "success": true, "latency_ms": 400.0 },
        { "at": "2026-10-12T10:00:09Z", "success": true, "latency_ms": 90.0 },
        { "at": "2026-10-12T10:00:10Z", "success": true, "latency_ms": 54.0 },
        { "at": "2026-10-12T10:00:11Z", "success": true, "latency_ms": 52.0 },
        { "at": "2026-10-12T10:00:12Z", "success": true, "latency_ms": 50.0 },
        { "at": "2026-10-12T10:00:13Z", "success": true, "latency_ms": 50.0 },
        { "at": "2026-10-12T10:00:14Z", "success": true, "latency_ms": 50.0 },
        { "at": "2026-10-12T10:00:15Z", "success": true, "latency_ms": 50.0 }
      ]
    },
    {
      "scenario_name": "skipped-after",
      "fault_type": "cpu",
      "intensity": "heavy",
      "started_at": "2026-10-12T10:00:20Z",
      "ended_at": "2026-10-12T10:00:20Z",
      "outcome": "skipped",
      "probes": [
        { "at": "2026-10-12T10:00:20Z", "success": false, "latency_ms": 1.0 }
      ]
    }
  ]
}"#;

fn load() -> InjectionRun {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chaos-results.json");
    std::fs::write(&path, RESULTS).unwrap();
    InjectionRun::from_path(&path).unwrap()
}

#[test]
fn metrics_follow_the_recorded_probe_sequence() {
    let run = load();
    let verdict = ResilienceValidator::new(SloThresholds::default()).validate(&run);

    // Skipped scenarios never contribute probes.
    assert_eq!(verdict.metric(SloMetric::Availability).unwrap().actual, 80.0);
    assert_eq!(verdict.metric(SloMetric::ErrorRate).unwrap().actual, 20.0);
    // First failure at :06, stable run of three starts at :08.
    assert_eq!(verdict.metric(SloMetric::Mttr).unwrap().actual, 2.0);
    // Latency within 55 ms (110% of the 50 ms baseline median) first at :10.
    assert_eq!(verdict.metric(SloMetric::RecoveryTime).unwrap().actual, 5.0);
    // Median of successful chaos latencies is 51 ms against a 50 ms baseline.
    assert_eq!(
        verdict.metric(SloMetric::LatencyDegradation).unwrap().actual,
        1.0
    );
    assert!(!verdict.overall_pass());
}

#[test]
fn fail_on_violation_signals_while_report_mode_returns_verdict() {
    let run = load();
    let dir = tempfile::tempdir().unwrap();
    let slo = dir.path().join("slo.toml");
    std::fs::write(
        &slo,
        "mttr_seconds = 10\nmax_error_rate_percent = 25\nmin_availability_percent = 75\nmax_latency_degradation_ms = 100\nmax_recovery_seconds = 10\n",
    )
    .unwrap();
    let lenient = SloThresholds::from_path(&slo).unwrap();
    let verdict = ResilienceValidator::new(lenient).validate(&run);
    assert!(verdict.overall_pass(), "{verdict:?}");
    assert!(enforce(verdict, Enforcement::FailOnViolation).is_ok());

    let strict = ResilienceValidator::new(SloThresholds::default()).validate(&run);
    assert!(enforce(strict.clone(), Enforcement::Report).is_ok());
    let violation = enforce(strict, Enforcement::FailOnViolation).unwrap_err();
    assert!(violation.to_string().contains("availability"));
}
