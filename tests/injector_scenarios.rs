//! ---
//! fl_section: "15-testing-qa-runbook"
//! fl_subsection: "integration-tests"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Fault injector runs against a live HTTP target and switchable fakes."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use faultline_common::{CancellationToken, ScenarioDocument};
use faultline_injector::testing::{RecordingLoadGenerator, SwitchDisruptor, SwitchProbe};
use faultline_injector::{
    Capabilities, FaultInjector, HealthProbe, HttpHealthProbe, InjectionOutcome, InjectionRun,
    InjectorSettings, RunStatus, SimulatedNetwork, Target,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

async fn spawn_health_server() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok")
                    .await;
            });
        }
    });
    Url::parse(&format!("http://{}", addr)).unwrap()
}

fn capabilities(
    probe: Arc<dyn HealthProbe>,
    network: Arc<SimulatedNetwork>,
    healthy: Arc<AtomicBool>,
) -> Capabilities {
    Capabilities {
        probe,
        load: Arc::new(RecordingLoadGenerator::new()),
        network,
        disruptor: Arc::new(SwitchDisruptor::new(healthy)),
    }
}

#[tokio::test]
async fn sequential_run_against_http_target_flushes_results() {
    let base = spawn_health_server().await;
    let document: ScenarioDocument = r#"
        baseline_seconds = 0.2
        recovery_window_seconds = 1
        stabilization_successes = 2
        [probe]
        interval_seconds = 0.05
        timeout_seconds = 1
        [[scenarios]]
        name = "cpu-light"
        fault_type = "cpu"
        duration_seconds = 1
        [[scenarios]]
        name = "latency"
        fault_type = "network_delay"
        duration_seconds = 1
    "#
    .parse()
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("chaos-results.json");
    let probe = HttpHealthProbe::new(&base, &document.probe.path, document.probe.timeout).unwrap();
    let healthy = Arc::new(AtomicBool::new(true));
    let injector = FaultInjector::new(
        InjectorSettings::from_document(&document).with_results_path(&output),
        Target::new(base),
        capabilities(Arc::new(probe), Arc::new(SimulatedNetwork::new()), healthy),
        None,
    );

    let run = injector
        .run(&document.scenarios, &CancellationToken::new())
        .await;
    assert_eq!(run.status, RunStatus::Completed);
    assert!(!run.baseline.is_empty());
    let names: Vec<_> = run.results.iter().map(|r| r.scenario_name.as_str()).collect();
    assert_eq!(names, vec!["cpu-light", "latency"]);

    let total: f64 = run.executed().map(|r| r.duration_seconds()).sum();
    let wall = (run.finished_at.unwrap() - run.started_at).num_milliseconds() as f64 / 1000.0;
    assert!(wall >= 2.0, "wall clock {wall}s shorter than scenario durations");
    assert!(total >= 2.0);
    assert!(run.results.iter().all(|r| r.failed_probes == 0));

    let flushed = InjectionRun::from_path(&output).unwrap();
    assert_eq!(flushed.run_id, run.run_id);
    assert_eq!(flushed.results.len(), 2);
}

#[tokio::test]
async fn service_downtime_measures_time_to_recovery() {
    let document: ScenarioDocument = r#"
        baseline_seconds = 0
        recovery_window_seconds = 2
        stabilization_successes = 3
        [probe]
        interval_seconds = 0.02
        [[scenarios]]
        name = "downtime"
        fault_type = "service_downtime"
        duration_seconds = 1
        parameters = { stop_command = "svc stop", start_command = "svc start" }
    "#
    .parse()
    .unwrap();
    let healthy = Arc::new(AtomicBool::new(true));
    let disruptor = Arc::new(SwitchDisruptor::new(Arc::clone(&healthy)));
    let injector = FaultInjector::new(
        InjectorSettings::from_document(&document),
        Target::new(Url::parse("http://127.0.0.1:9").unwrap()),
        Capabilities {
            probe: Arc::new(SwitchProbe::new(Arc::clone(&healthy), 4.0)),
            load: Arc::new(RecordingLoadGenerator::new()),
            network: Arc::new(SimulatedNetwork::new()),
            disruptor: disruptor.clone(),
        },
        None,
    );
    let run = injector
        .run(&document.scenarios, &CancellationToken::new())
        .await;
    let result = &run.results[0];
    assert_eq!(result.outcome, InjectionOutcome::Success, "{:?}", result.error_detail);
    assert!(result.failed_probes > 0);
    assert!(result.time_to_recovery_seconds.unwrap() < 1.0);
    assert_eq!(disruptor.calls(), vec!["svc stop", "svc start"]);
}

#[tokio::test]
async fn cancellation_rolls_back_and_flushes_partial_results() {
    let document: ScenarioDocument = r#"
        baseline_seconds = 0
        [probe]
        interval_seconds = 0.02
        [[scenarios]]
        name = "loss"
        fault_type = "network_loss"
        duration_seconds = 30
        parameters = { loss_percent = 20.0, interface = "eth9" }
        [[scenarios]]
        name = "never-started"
        fault_type = "cpu"
        duration_seconds = 30
    "#
    .parse()
    .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("partial.json");
    let network = Arc::new(SimulatedNetwork::new());
    let before = network.current("eth9");
    let healthy = Arc::new(AtomicBool::new(true));
    let injector = FaultInjector::new(
        InjectorSettings::from_document(&document).with_results_path(&output),
        Target::new(Url::parse("http://127.0.0.1:9").unwrap()),
        capabilities(
            Arc::new(SwitchProbe::new(Arc::clone(&healthy), 2.0)),
            Arc::clone(&network),
            healthy,
        ),
        None,
    );

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });
    let run = tokio::time::timeout(Duration::from_secs(10), injector.run(&document.scenarios, &token))
        .await
        .expect("cancellation must stop the run promptly");

    assert_eq!(run.status, RunStatus::Interrupted);
    assert_eq!(network.current("eth9"), before);
    assert_eq!(run.results[0].outcome, InjectionOutcome::Failure);
    assert_eq!(run.results[1].outcome, InjectionOutcome::Skipped);

    let flushed = InjectionRun::from_path(&output).unwrap();
    assert_eq!(flushed.status, RunStatus::Interrupted);
}

#[tokio::test]
async fn abort_conditions_skip_remaining_scenarios() {
    let document: ScenarioDocument = r#"
        baseline_seconds = 0
        recovery_window_seconds = 0
        [abort_conditions]
        max_consecutive_failures = 1
        [probe]
        interval_seconds = 0.05
        [[scenarios]]
        name = "crash-without-pid"
        fault_type = "process_crash"
        duration_seconds = 1
        [[scenarios]]
        name = "cpu"
        fault_type = "cpu"
        duration_seconds = 1
    "#
    .parse()
    .unwrap();
    let healthy = Arc::new(AtomicBool::new(true));
    let injector = FaultInjector::new(
        InjectorSettings::from_document(&document),
        Target::new(Url::parse("http://127.0.0.1:9").unwrap()),
        capabilities(
            Arc::new(SwitchProbe::new(Arc::clone(&healthy), 2.0)),
            Arc::new(SimulatedNetwork::new()),
            healthy,
        ),
        None,
    );
    let run = injector
        .run(&document.scenarios, &CancellationToken::new())
        .await;
    assert_eq!(run.status, RunStatus::PartiallyComplete);
    assert!(run.abort_reason.as_deref().unwrap().contains("consecutive"));
    assert_eq!(run.results[0].outcome, InjectionOutcome::Failure);
    assert_eq!(run.results[1].outcome, InjectionOutcome::Skipped);
}
