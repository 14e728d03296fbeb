//! ---
//! fl_section: "15-testing-qa-runbook"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Integration tests for the auto-healer."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use faultline_common::{CancellationToken, FailureCategory};
use faultline_healer::{
    AutoHealer, BackoffSchedule, HealerPolicy, HealerState, SentinelFixer, ShellCommandRunner,
};
use faultline_history::{HealingOutcome, HealingStrategy, HistoryStore};
use faultline_sentinel::{DependencySentinel, PackageInstaller};

struct AcceptingInstaller;

impl PackageInstaller for AcceptingInstaller {
    fn install(&self, _requirement: &str) -> Result<(), String> {
        Ok(())
    }
}

fn quick_policy(max_retries: u32) -> HealerPolicy {
    HealerPolicy {
        max_retries,
        retry_delay: Duration::from_millis(5),
        retry_step_cap: Duration::from_millis(10),
        health_backoff: BackoffSchedule::new(
            Duration::from_millis(5),
            Duration::from_millis(10),
            Duration::from_millis(40),
        ),
        stabilization_wait: Duration::from_millis(5),
        jitter: Duration::ZERO,
    }
}

/// Shell command that fails with an import error until the marker file holds `n` lines.
fn flaky_import_command(marker: &std::path::Path, failures: usize) -> String {
    format!(
        "count=$(cat '{m}' 2>/dev/null | wc -l); echo run >> '{m}'; \
         if [ \"$count\" -lt {failures} ]; then echo \"ModuleNotFoundError: No module named 'yaml'\" >&2; exit 1; fi",
        m = marker.display()
    )
}

#[tokio::test]
async fn two_dependency_failures_then_success_records_history() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("runs.txt");
    let source = dir.path().join("src");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("job.py"), "import yaml\n").unwrap();
    let manifest = dir.path().join("requirements.txt");

    let history = HistoryStore::open(dir.path().join("history.jsonl")).unwrap();
    let sentinel = DependencySentinel::new(&source, &manifest)
        .with_installer(Arc::new(AcceptingInstaller));
    let healer = AutoHealer::new(Arc::new(ShellCommandRunner::new()), quick_policy(3))
        .with_dependency_fixer(Arc::new(SentinelFixer::new(sentinel)))
        .with_history(&history);

    let command = flaky_import_command(&marker, 2);
    let report = healer
        .execute(&command, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.final_state, HealerState::Success);
    assert_eq!(report.executions, 3);
    assert_eq!(report.attempts.len(), 2);
    for (index, attempt) in report.attempts.iter().enumerate() {
        assert_eq!(attempt.attempt_number, index as u32 + 1);
        assert_eq!(attempt.failure_category, FailureCategory::Dependency);
        assert_eq!(attempt.strategy, HealingStrategy::InstallDependencies);
    }
    assert_eq!(report.attempts[1].outcome, HealingOutcome::Healed);
    assert_eq!(fs::read_to_string(&manifest).unwrap(), "PyYAML>=6.0\n");

    let snapshot = history.load().unwrap();
    assert_eq!(snapshot.failures.len(), 2);
    assert_eq!(snapshot.healing_attempts.len(), 2);
    assert_eq!(snapshot.manifest_changes.len(), 1);
    assert_eq!(snapshot.runs.len(), 1);
    assert!(snapshot.runs[0].success);
    assert_eq!(snapshot.runs[0].attempts, 3);
}

#[tokio::test]
async fn terminal_failure_keeps_full_attempt_history() {
    let dir = tempfile::tempdir().unwrap();
    let history = HistoryStore::open(dir.path().join("history.jsonl")).unwrap();
    let healer = AutoHealer::new(Arc::new(ShellCommandRunner::new()), quick_policy(2))
        .with_history(&history);

    let report = healer
        .execute("echo 'scenario cpu-heavy failed: stress-ng exited 2' >&2; exit 2", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.final_state, HealerState::TerminalFailure);
    assert_eq!(report.executions, 3);
    assert_eq!(report.attempts.len(), 2);
    assert!(report
        .attempts
        .iter()
        .all(|a| a.strategy == HealingStrategy::StabilizationWait && !a.outcome.is_healed()));
    let err = report.terminal_error().unwrap();
    assert_eq!(err.category(), FailureCategory::Injection);
    assert!(err.to_string().contains("after 3 attempt(s)"));

    let runs = history.load().unwrap().runs;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, "retries_exhausted");
}
