//! ---
//! fl_section: "15-testing-qa-runbook"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Smoke tests for the faultlinectl binary."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use assert_cmd::Command;
use serde_json::{json, Value};

const SCENARIOS: &str = r#"
baseline_seconds = 0

[slo]
mttr_seconds = 30
max_error_rate_percent = 5
min_availability_percent = 95
max_latency_degradation_ms = 500
max_recovery_seconds = 60

[groups]
smoke = ["cpu-light"]

[[scenarios]]
name = "cpu-light"
fault_type = "cpu"
intensity = "light"
duration_seconds = 30

[[scenarios]]
name = "latency"
fault_type = "network_delay"
intensity = "medium"
duration_seconds = 20
parameters = { delay_ms = 200 }
"#;

fn faultlinectl(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("faultlinectl").unwrap();
    cmd.current_dir(dir)
        .env_remove("FAULTLINE_CONFIG")
        .env("FAULTLINE_LOG", "warn")
        .arg("--history")
        .arg(dir.join("history.jsonl"));
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn dry_run_describes_every_selected_scenario() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("chaos.toml"), SCENARIOS).unwrap();

    let output = faultlinectl(dir.path())
        .args(["inject", "--config", "chaos.toml", "--target", "http://127.0.0.1:9"])
        .args(["--dry-run", "--network", "simulated", "--load-generator", "in-process"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let summary = stdout_json(&output);
    assert_eq!(summary["skipped"], 2);

    let results: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("chaos-results.json")).unwrap())
            .unwrap();
    assert_eq!(results["dry_run"], true);
    let names: Vec<_> = results["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["scenario_name"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(names, vec!["cpu-light", "latency"]);
}

#[test]
fn unknown_group_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("chaos.toml"), SCENARIOS).unwrap();

    faultlinectl(dir.path())
        .args(["inject", "--config", "chaos.toml", "--target", "http://127.0.0.1:9"])
        .args(["--dry-run", "--group", "nightly"])
        .assert()
        .code(1);
    assert!(!dir.path().join("chaos-results.json").exists());
}

#[test]
fn health_check_error_spike_aborts_with_exit_two() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("spike.toml"),
        r#"
baseline_seconds = 0
recovery_window_seconds = 0.2

[probe]
interval_seconds = 0.1
timeout_seconds = 0.5

[abort_conditions]
max_consecutive_failures = 0
error_rate_spike_percent = 50.0
min_probes_for_error_rate = 3

[[scenarios]]
name = "first"
fault_type = "cpu"
intensity = "light"
duration_seconds = 1
parameters = { workers = 1 }

[[scenarios]]
name = "second"
fault_type = "cpu"
intensity = "light"
duration_seconds = 1
parameters = { workers = 1 }
"#,
    )
    .unwrap();

    // Nothing listens on the discard port, so every health check fails.
    let output = faultlinectl(dir.path())
        .args(["inject", "--config", "spike.toml", "--target", "http://127.0.0.1:9"])
        .args(["--network", "simulated", "--load-generator", "in-process"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2), "{}", String::from_utf8_lossy(&output.stderr));
    let summary = stdout_json(&output);
    assert_eq!(summary["status"], "partially_complete");
    assert_eq!(summary["skipped"], 1);

    let results: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("chaos-results.json")).unwrap())
            .unwrap();
    assert_eq!(results["status"], "partially_complete");
    assert_eq!(results["results"][0]["outcome"], "success");
    assert_eq!(results["results"][1]["outcome"], "skipped");
}

#[test]
fn validate_exits_non_zero_only_when_enforcing() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("chaos.toml"), SCENARIOS).unwrap();
    let probes: Vec<Value> = (0..4)
        .map(|i| {
            json!({
                "at": format!("2026-10-01T00:00:0{i}Z"),
                "success": false,
                "latency_ms": 2000.0,
                "error": "connection refused"
            })
        })
        .collect();
    let results = json!({
        "run_id": "6f0c1f8e-3a8b-4b8e-9f53-0d3c3b1f2a10",
        "target": { "base_url": "http://127.0.0.1:9/" },
        "dry_run": false,
        "started_at": "2026-10-01T00:00:00Z",
        "finished_at": "2026-10-01T00:00:10Z",
        "status": "completed",
        "results": [{
            "scenario_name": "cpu-light",
            "fault_type": "cpu",
            "intensity": "light",
            "started_at": "2026-10-01T00:00:00Z",
            "ended_at": "2026-10-01T00:00:04Z",
            "outcome": "success",
            "probes": probes,
            "failed_probes": 4
        }]
    });
    fs::write(dir.path().join("results.json"), results.to_string()).unwrap();

    let report = faultlinectl(dir.path())
        .args(["validate", "--results", "results.json", "--thresholds", "chaos.toml"])
        .output()
        .unwrap();
    assert!(report.status.success());
    let verdict = stdout_json(&report);
    assert_eq!(verdict["overall_pass"], false);

    faultlinectl(dir.path())
        .args(["validate", "--results", "results.json", "--thresholds", "chaos.toml"])
        .arg("--fail-on-violation")
        .assert()
        .code(1);
}

fn mttr_verdict(verdict: &Value) -> &Value {
    verdict["metrics"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["metric"] == "mttr")
        .unwrap()
}

#[test]
fn validate_uses_the_scenario_document_stabilization_rule() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("chaos.toml"),
        format!("stabilization_successes = 2\n{SCENARIOS}"),
    )
    .unwrap();
    let probes = json!([
        { "at": "2026-10-01T00:00:00Z", "success": false, "latency_ms": 900.0, "error": "connection refused" },
        { "at": "2026-10-01T00:00:01Z", "success": true, "latency_ms": 20.0, "status": 200 },
        { "at": "2026-10-01T00:00:02Z", "success": true, "latency_ms": 20.0, "status": 200 }
    ]);
    let results = json!({
        "run_id": "0b7e3f52-2a51-4f0c-8c55-3f6f0e1d9a21",
        "target": { "base_url": "http://127.0.0.1:9/" },
        "dry_run": false,
        "started_at": "2026-10-01T00:00:00Z",
        "finished_at": "2026-10-01T00:00:03Z",
        "status": "completed",
        "results": [{
            "scenario_name": "cpu-light",
            "fault_type": "cpu",
            "intensity": "light",
            "started_at": "2026-10-01T00:00:00Z",
            "ended_at": "2026-10-01T00:00:03Z",
            "outcome": "success",
            "probes": probes,
            "failed_probes": 1
        }]
    });
    fs::write(dir.path().join("results.json"), results.to_string()).unwrap();

    let from_document = faultlinectl(dir.path())
        .args(["validate", "--results", "results.json", "--thresholds", "chaos.toml"])
        .output()
        .unwrap();
    assert!(from_document.status.success());
    let verdict = stdout_json(&from_document);
    let mttr = mttr_verdict(&verdict);
    assert_eq!(mttr["passed"], true);
    assert_eq!(mttr["actual"], 1.0);

    let from_flag = faultlinectl(dir.path())
        .args(["validate", "--results", "results.json", "--thresholds", "chaos.toml"])
        .args(["--stabilization-successes", "3"])
        .output()
        .unwrap();
    let verdict = stdout_json(&from_flag);
    assert_eq!(mttr_verdict(&verdict)["passed"], false);
}

#[test]
fn heal_reports_success_and_terminal_failure() {
    let dir = tempfile::tempdir().unwrap();

    let ok = faultlinectl(dir.path())
        .args(["heal", "--command", "exit 0"])
        .output()
        .unwrap();
    assert!(ok.status.success());
    assert_eq!(stdout_json(&ok)["final_state"], "SUCCESS");

    let failed = faultlinectl(dir.path())
        .args(["heal", "--command", "echo boom >&2; exit 3"])
        .args(["--max-retries", "0", "--retry-delay", "0"])
        .output()
        .unwrap();
    assert_eq!(failed.status.code(), Some(1));
    let report = stdout_json(&failed);
    assert_eq!(report["final_state"], "TERMINAL_FAILURE");
    assert_eq!(report["executions"], 1);
}

#[test]
fn sentinel_check_then_fix() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("app");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("main.py"), "import os\nimport yaml\n").unwrap();
    fs::write(dir.path().join("requirements.txt"), "requests>=2.31\n").unwrap();

    let check = faultlinectl(dir.path())
        .args(["sentinel", "--source", "app", "--manifest", "requirements.txt"])
        .output()
        .unwrap();
    assert_eq!(check.status.code(), Some(1));
    assert_eq!(stdout_json(&check)["missing"][0]["package"], "PyYAML");

    faultlinectl(dir.path())
        .args(["sentinel", "--source", "app", "--manifest", "requirements.txt", "--fix"])
        .assert()
        .success();
    assert_eq!(
        fs::read_to_string(dir.path().join("requirements.txt")).unwrap(),
        "requests>=2.31\nPyYAML>=6.0\n"
    );
}

#[test]
fn report_writes_window_over_empty_history() {
    let dir = tempfile::tempdir().unwrap();
    let output = faultlinectl(dir.path())
        .args(["report", "--lookback-days", "7", "--until", "2026-10-19T00:00:00Z"])
        .args(["--metrics-out", "metrics.prom"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout_json(&output)["total_runs"], 0);

    let report: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("weekly-report.json")).unwrap())
            .unwrap();
    assert_eq!(report["window"]["lookback_days"], 7);
    assert_eq!(report["recommendations"][0]["rule"], "no-runs");
    assert!(dir.path().join("metrics.prom").exists());
}
