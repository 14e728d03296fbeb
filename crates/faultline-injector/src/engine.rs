//! ---
//! fl_section: "02-fault-injection"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Fault injection engine and capability adapters."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use faultline_common::time::seconds_between;
use faultline_common::{
    AbortConditions, CancellationToken, FaultFamily, FaultType, FaultlineError, Intensity,
    Result, ScenarioDocument, ScenarioSpec, WorkerLimits,
};
use faultline_logging::{fl_error, fl_info, fl_warn, log_system_event, LogContext, SystemEventOutcome};
use faultline_metrics::FaultlineMetrics;
use tracing::{info, warn};

use crate::disruption::ProcessDisruptor;
use crate::load::{LoadGenerator, LoadRequest, ResourceKind};
use crate::model::{InjectionOutcome, InjectionResult, InjectionRun, ProbeSample, RunStatus, Target};
use crate::network::{Impairment, ImpairmentGuard, NetworkImpairer};
use crate::probe::{HealthPoller, HealthProbe};

const MIB: u64 = 1024 * 1024;
const DEFAULT_SIGNAL: &str = "TERM";

/// Run-wide knobs taken from the scenario document.
#[derive(Debug, Clone)]
pub struct InjectorSettings {
    pub probe_interval: Duration,
    pub baseline: Duration,
    pub recovery_window: Duration,
    pub stabilization_successes: u32,
    pub abort: AbortConditions,
    pub workers: WorkerLimits,
    pub network_interface: String,
    /// Directory disk workers write into.
    pub scratch_dir: PathBuf,
    /// When set, the run document is rewritten here after every scenario.
    pub results_path: Option<PathBuf>,
}

impl InjectorSettings {
    pub fn from_document(document: &ScenarioDocument) -> Self {
        Self {
            probe_interval: document.probe.interval,
            baseline: document.baseline,
            recovery_window: document.recovery_window,
            stabilization_successes: document.stabilization_successes,
            abort: document.abort_conditions,
            workers: document.workers,
            network_interface: document.network_interface.clone(),
            scratch_dir: std::env::temp_dir().join("faultline"),
            results_path: None,
        }
    }

    pub fn with_results_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_path = Some(path.into());
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }
}

/// Side-effecting collaborators, swappable for fakes in tests.
#[derive(Clone)]
pub struct Capabilities {
    pub probe: Arc<dyn HealthProbe>,
    pub load: Arc<dyn LoadGenerator>,
    pub network: Arc<dyn NetworkImpairer>,
    pub disruptor: Arc<dyn ProcessDisruptor>,
}

/// Tracks the run-level abort triggers.
#[derive(Debug, Default)]
struct AbortTracker {
    consecutive_failures: u32,
    probes: u64,
    failed_probes: u64,
}

impl AbortTracker {
    fn observe(&mut self, result: &InjectionResult) {
        match result.outcome {
            InjectionOutcome::Failure => self.consecutive_failures += 1,
            InjectionOutcome::Success => self.consecutive_failures = 0,
            InjectionOutcome::Skipped => {}
        }
        self.probes += result.probes.len() as u64;
        self.failed_probes += u64::from(result.failed_probes);
    }

    fn tripped(&self, conditions: &AbortConditions) -> Option<String> {
        if let Some(max) = conditions.max_consecutive_failures {
            if max > 0 && self.consecutive_failures >= max {
                return Some(format!(
                    "{} consecutive scenario failures (limit {})",
                    self.consecutive_failures, max
                ));
            }
        }
        if let Some(limit) = conditions.error_rate_spike_percent {
            if self.probes >= u64::from(conditions.min_probes_for_error_rate) && self.probes > 0 {
                let rate = 100.0 * self.failed_probes as f64 / self.probes as f64;
                if rate > limit {
                    return Some(format!(
                        "probe error rate {:.1}% exceeded spike limit {:.1}%",
                        rate, limit
                    ));
                }
            }
        }
        None
    }
}

/// Executes fault scenarios sequentially against one target.
pub struct FaultInjector {
    settings: InjectorSettings,
    target: Target,
    capabilities: Capabilities,
    poller: HealthPoller,
    metrics: Option<FaultlineMetrics>,
}

impl FaultInjector {
    pub fn new(
        settings: InjectorSettings,
        target: Target,
        capabilities: Capabilities,
        metrics: Option<FaultlineMetrics>,
    ) -> Self {
        let poller = HealthPoller::new(Arc::clone(&capabilities.probe), settings.probe_interval)
            .with_metrics(metrics.clone());
        Self {
            settings,
            target,
            capabilities,
            poller,
            metrics,
        }
    }

    /// Validate and describe each scenario without touching the host or the target.
    pub fn dry_run(&self, scenarios: &[ScenarioSpec]) -> InjectionRun {
        let mut run = InjectionRun::new(self.target.clone(), true);
        for scenario in scenarios {
            let mut result = InjectionResult::begin(
                &scenario.name,
                scenario.fault_type,
                scenario.intensity,
                Utc::now(),
            );
            match self.plan(scenario) {
                Ok(plan) => result.skip(format!("dry-run: would {}", plan)),
                Err(err) => result.skip(format!("dry-run: scenario would fail: {}", err)),
            }
            fl_info!(
                context = LogContext::new().with_scenario(&scenario.name),
                "{}",
                result.warnings.last().map(String::as_str).unwrap_or_default()
            );
            run.results.push(result);
        }
        run.finished_at = Some(Utc::now());
        self.flush(&run);
        run
    }

    /// Execute scenarios in order, honouring abort conditions and cancellation.
    pub async fn run(&self, scenarios: &[ScenarioSpec], token: &CancellationToken) -> InjectionRun {
        let mut run = InjectionRun::new(self.target.clone(), false);
        info!(
            run_id = %run.run_id,
            target = %self.target.base_url,
            scenarios = scenarios.len(),
            load_generator = self.capabilities.load.name(),
            network = self.capabilities.network.name(),
            "injection run starting"
        );

        if !self.settings.baseline.is_zero() {
            let observed = self
                .poller
                .observe("baseline", self.settings.baseline, token, &mut run.baseline)
                .await;
            if observed.is_err() {
                return self.interrupt(run, scenarios, 0);
            }
            if run.baseline.iter().all(|s| !s.success) {
                run.warnings
                    .push("no successful baseline probe; degradation metrics will be zero".into());
            }
        }

        let mut tracker = AbortTracker::default();
        for (index, scenario) in scenarios.iter().enumerate() {
            if token.is_cancelled() {
                return self.interrupt(run, scenarios, index);
            }
            let (result, interrupted) = self.execute(scenario, token).await;
            if let Some(metrics) = &self.metrics {
                metrics.record_scenario(scenario.fault_type.as_str(), result.outcome.as_str());
            }
            tracker.observe(&result);
            run.results.push(result);
            self.flush(&run);

            if interrupted {
                return self.interrupt(run, scenarios, index + 1);
            }
            if let Some(reason) = tracker.tripped(&self.settings.abort) {
                log_system_event(
                    None,
                    "injector.abort",
                    &format!("abort conditions exceeded: {}", reason),
                    SystemEventOutcome::Fault,
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_abort();
                }
                for remaining in &scenarios[index + 1..] {
                    let mut skipped = InjectionResult::begin(
                        &remaining.name,
                        remaining.fault_type,
                        remaining.intensity,
                        Utc::now(),
                    );
                    skipped.skip(format!("skipped: run aborted ({})", reason));
                    run.results.push(skipped);
                }
                run.status = RunStatus::PartiallyComplete;
                run.abort_reason = Some(reason);
                break;
            }
        }

        run.finished_at = Some(Utc::now());
        self.flush(&run);
        info!(
            run_id = %run.run_id,
            status = run.status.as_str(),
            succeeded = run.count(InjectionOutcome::Success),
            failed = run.count(InjectionOutcome::Failure),
            skipped = run.count(InjectionOutcome::Skipped),
            "injection run finished"
        );
        run
    }

    fn interrupt(&self, mut run: InjectionRun, scenarios: &[ScenarioSpec], from: usize) -> InjectionRun {
        for remaining in &scenarios[from.min(scenarios.len())..] {
            let mut skipped = InjectionResult::begin(
                &remaining.name,
                remaining.fault_type,
                remaining.intensity,
                Utc::now(),
            );
            skipped.skip("not started: run interrupted");
            run.results.push(skipped);
        }
        run.status = RunStatus::Interrupted;
        run.finished_at = Some(Utc::now());
        self.flush(&run);
        log_system_event(
            None,
            "injector.interrupted",
            "run interrupted; resources released and partial results flushed",
            SystemEventOutcome::Degraded,
        );
        run
    }

    fn flush(&self, run: &InjectionRun) {
        if let Some(path) = &self.settings.results_path {
            if let Err(err) = run.write_to(path) {
                warn!(path = %path.display(), error = %err, "failed to flush injection results");
            }
        }
    }

    /// Run one scenario. The flag is true when cancellation stopped it.
    async fn execute(&self, scenario: &ScenarioSpec, token: &CancellationToken) -> (InjectionResult, bool) {
        let ctx = LogContext::new().with_scenario(&scenario.name);
        let mut result = InjectionResult::begin(
            &scenario.name,
            scenario.fault_type,
            scenario.intensity,
            Utc::now(),
        );
        fl_info!(
            context = ctx.clone(),
            "scenario starting: {} ({}) for {}s",
            scenario.fault_type,
            scenario.intensity.as_str(),
            scenario.duration.as_secs()
        );

        let outcome = match scenario.fault_type.family() {
            FaultFamily::ResourceExhaustion => self.run_resource(scenario, token, &mut result).await,
            FaultFamily::NetworkDegradation => self.run_network(scenario, token, &mut result).await,
            FaultFamily::ProcessDisruption => self.run_process(scenario, token, &mut result).await,
        };

        match outcome {
            Ok(()) => {
                result.succeed();
                fl_info!(
                    context = ctx,
                    "scenario finished in {:.1}s with {} failed probe(s)",
                    result.duration_seconds(),
                    result.failed_probes
                );
                (result, false)
            }
            Err(FaultlineError::Interrupted) => {
                result.fail(FaultlineError::Interrupted.to_string());
                fl_warn!(context = ctx, "scenario interrupted; cleanup completed");
                (result, true)
            }
            Err(err) => {
                result.fail(err.to_string());
                fl_error!(context = ctx, "scenario failed: {}", err);
                (result, false)
            }
        }
    }

    fn load_request(&self, scenario: &ScenarioSpec, kind: ResourceKind) -> LoadRequest {
        let limits = &self.settings.workers;
        let params = &scenario.parameters;
        let (max, bytes) = match kind {
            ResourceKind::Cpu => (limits.cpu, 0),
            ResourceKind::Memory => (
                limits.memory,
                params.memory_mb_per_worker.unwrap_or(limits.memory_mb_per_worker) * MIB,
            ),
            ResourceKind::Disk => (
                limits.disk,
                params.disk_mb_per_worker.unwrap_or(limits.disk_mb_per_worker) * MIB,
            ),
        };
        LoadRequest {
            kind,
            workers: params
                .workers
                .unwrap_or_else(|| scenario.intensity.workers(max)),
            bytes_per_worker: bytes,
            scratch_dir: self.settings.scratch_dir.clone(),
            max_duration: scenario.duration + self.settings.recovery_window,
        }
    }

    fn impairment(scenario: &ScenarioSpec) -> Impairment {
        let params = &scenario.parameters;
        match scenario.fault_type {
            FaultType::NetworkLoss => Impairment::Loss {
                percent: params.loss_percent.unwrap_or(match scenario.intensity {
                    Intensity::Light => 5.0,
                    Intensity::Medium => 10.0,
                    Intensity::Heavy => 25.0,
                }),
            },
            _ => Impairment::Delay {
                delay_ms: params.delay_ms.unwrap_or(match scenario.intensity {
                    Intensity::Light => 100,
                    Intensity::Medium => 250,
                    Intensity::Heavy => 500,
                }),
                jitter_ms: params.jitter_ms.unwrap_or(0),
            },
        }
    }

    fn interface<'a>(&'a self, scenario: &'a ScenarioSpec) -> &'a str {
        scenario
            .parameters
            .interface
            .as_deref()
            .unwrap_or(&self.settings.network_interface)
    }

    fn crash_pid(&self, scenario: &ScenarioSpec) -> Result<u32> {
        self.target
            .process_id
            .or(scenario.parameters.pid)
            .ok_or_else(|| {
                FaultlineError::configuration(format!(
                    "scenario '{}' needs a target process id (--pid or parameters.pid)",
                    scenario.name
                ))
            })
    }

    /// Human-readable description of what a scenario would do.
    fn plan(&self, scenario: &ScenarioSpec) -> Result<String> {
        let seconds = scenario.duration.as_secs();
        Ok(match scenario.fault_type {
            FaultType::Cpu | FaultType::Memory | FaultType::Disk => {
                let kind = ResourceKind::from_fault(scenario.fault_type)
                    .ok_or_else(|| FaultlineError::injection("not a resource fault"))?;
                let request = self.load_request(scenario, kind);
                format!(
                    "apply {} pressure with {} worker(s) via {} for {}s",
                    kind.as_str(),
                    request.workers,
                    self.capabilities.load.name(),
                    seconds
                )
            }
            FaultType::NetworkDelay | FaultType::NetworkLoss => format!(
                "apply {:?} on {} via {} for {}s",
                Self::impairment(scenario),
                self.interface(scenario),
                self.capabilities.network.name(),
                seconds
            ),
            FaultType::ProcessCrash => format!(
                "send SIG{} to pid {} and observe recovery for {}s",
                scenario.parameters.signal.as_deref().unwrap_or(DEFAULT_SIGNAL),
                self.crash_pid(scenario)?,
                seconds
            ),
            FaultType::ServiceDowntime => format!(
                "stop the service for {}s with '{}' then start it with '{}'",
                seconds,
                scenario.parameters.stop_command.as_deref().unwrap_or_default(),
                scenario.parameters.start_command.as_deref().unwrap_or_default()
            ),
        })
    }

    async fn run_resource(
        &self,
        scenario: &ScenarioSpec,
        token: &CancellationToken,
        result: &mut InjectionResult,
    ) -> Result<()> {
        let kind = ResourceKind::from_fault(scenario.fault_type)
            .ok_or_else(|| FaultlineError::injection("not a resource fault"))?;
        let request = self.load_request(scenario, kind);
        let mut load = self.capabilities.load.start(&request)?;
        result.workers = Some(load.active_workers());
        if load.active_workers() < request.workers {
            result.warnings.push(format!(
                "degraded: {} of {} requested workers running",
                load.active_workers(),
                request.workers
            ));
        }

        let mut samples = Vec::new();
        let observed = self
            .poller
            .observe(&scenario.name, scenario.duration, token, &mut samples)
            .await;
        let warnings = load.stop();
        drop(load);
        info!(scenario = %scenario.name, kind = kind.as_str(), "load generators stopped");
        let removed_at = Utc::now();
        result.fault_removed_at = Some(removed_at);
        result.warnings.extend(warnings);
        result.extend_probes(samples);
        observed?;
        self.observe_recovery(scenario, removed_at, token, result).await
    }

    async fn run_network(
        &self,
        scenario: &ScenarioSpec,
        token: &CancellationToken,
        result: &mut InjectionResult,
    ) -> Result<()> {
        let interface = self.interface(scenario);
        let impairment = Self::impairment(scenario);
        let mut guard =
            ImpairmentGuard::engage(self.capabilities.network.as_ref(), interface, &impairment)?;

        let mut samples = Vec::new();
        let observed = self
            .poller
            .observe(&scenario.name, scenario.duration, token, &mut samples)
            .await;
        let released = guard.release();
        drop(guard);
        let removed_at = Utc::now();
        result.fault_removed_at = Some(removed_at);
        result.extend_probes(samples);
        observed?;
        released?;
        self.observe_recovery(scenario, removed_at, token, result).await
    }

    async fn run_process(
        &self,
        scenario: &ScenarioSpec,
        token: &CancellationToken,
        result: &mut InjectionResult,
    ) -> Result<()> {
        let params = &scenario.parameters;
        let disruptor = &self.capabilities.disruptor;
        let mut samples: Vec<ProbeSample> = Vec::new();

        let removed_at = match scenario.fault_type {
            FaultType::ProcessCrash => {
                let pid = self.crash_pid(scenario)?;
                let signal = params.signal.as_deref().unwrap_or(DEFAULT_SIGNAL);
                disruptor.signal(pid, signal).await?;
                let crashed_at = Utc::now();
                if let Some(restart) = params.restart_command.as_deref() {
                    disruptor.run_command(restart).await?;
                }
                let observed = self
                    .poller
                    .observe(&scenario.name, scenario.duration, token, &mut samples)
                    .await;
                result.extend_probes(samples.drain(..));
                observed?;
                crashed_at
            }
            _ => {
                let stop = params.stop_command.as_deref().ok_or_else(|| {
                    FaultlineError::configuration("service_downtime requires stop_command")
                })?;
                let start = params.start_command.as_deref().ok_or_else(|| {
                    FaultlineError::configuration("service_downtime requires start_command")
                })?;
                disruptor.run_command(stop).await?;
                let observed = self
                    .poller
                    .observe(&scenario.name, scenario.duration, token, &mut samples)
                    .await;
                // The service is brought back even when the wait was interrupted.
                let started = disruptor.run_command(start).await;
                result.extend_probes(samples.drain(..));
                observed?;
                started?;
                Utc::now()
            }
        };
        result.fault_removed_at = Some(removed_at);
        self.observe_recovery(scenario, removed_at, token, result).await
    }

    /// Poll after fault removal until stable, stamping time-to-recovery.
    /// Only cancellation is an error here.
    async fn observe_recovery(
        &self,
        scenario: &ScenarioSpec,
        removed_at: DateTime<Utc>,
        token: &CancellationToken,
        result: &mut InjectionResult,
    ) -> Result<()> {
        let window = self.settings.recovery_window;
        if window.is_zero() {
            return Ok(());
        }
        // Probes already taken after removal (process scenarios) count toward stability.
        let required = self.settings.stabilization_successes.max(1) as usize;
        if let Some(at) = stabilized_at(&result.probes, removed_at, required) {
            result.time_to_recovery_seconds = Some(seconds_between(removed_at, at));
            return Ok(());
        }

        let mut samples = Vec::new();
        let stable = self
            .poller
            .observe_until_stable(&scenario.name, window, required as u32, token, &mut samples)
            .await;
        let recovered_at = match &stable {
            Ok(Some(index)) => samples.get(*index).map(|s| s.at),
            _ => None,
        };
        result.extend_probes(samples);
        stable?;
        match recovered_at {
            Some(at) => result.time_to_recovery_seconds = Some(seconds_between(removed_at, at)),
            // Slow recovery is scored by the validator; the fault itself was applied and lifted.
            None => {
                let note = format!(
                    "service did not stabilize within {:.1}s after fault removal",
                    window.as_secs_f64()
                );
                warn!(scenario = %scenario.name, "{}", note);
                result.warnings.push(note);
            }
        }
        Ok(())
    }
}

/// Timestamp of the first probe, at or after `from`, that starts a run of
/// `required` consecutive successes.
fn stabilized_at(probes: &[ProbeSample], from: DateTime<Utc>, required: usize) -> Option<DateTime<Utc>> {
    let mut streak_start = None;
    let mut streak = 0usize;
    for probe in probes.iter().filter(|p| p.at >= from) {
        if probe.success {
            if streak == 0 {
                streak_start = Some(probe.at);
            }
            streak += 1;
            if streak >= required {
                return streak_start;
            }
        } else {
            streak = 0;
        }
    }
    None
}

impl std::fmt::Debug for FaultInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultInjector")
            .field("target", &self.target)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
