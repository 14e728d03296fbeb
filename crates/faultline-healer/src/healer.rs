//! ---
//! fl_section: "05-self-healing"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Auto-healer: failure classification, remediation, bounded retries."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use faultline_common::time::{seconds_between, sleep_or_cancel};
use faultline_common::{
    CancellationToken, FailureCategory, FaultlineError, HealerSettings, Result,
};
use faultline_history::{
    FailureRecord, HealingAttempt, HealingOutcome, HealingStrategy, HistoryRecord, HistoryStore,
    RunKind, RunRecord,
};
use faultline_injector::HealthProbe;
use faultline_logging::{fl_info, fl_warn, log_system_event, LogContext, SystemEventOutcome};
use faultline_metrics::FaultlineMetrics;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backoff::BackoffSchedule;
use crate::remedy::DependencyFixer;
use crate::rules::matching_rule;
use crate::runner::{CommandOutput, CommandRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealerState {
    Pending,
    Running,
    Success,
    Failed,
    Categorizing,
    Healing,
    Retrying,
    TerminalFailure,
}

impl HealerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, HealerState::Success | HealerState::TerminalFailure)
    }
}

/// Why an episode ended in [`HealerState::TerminalFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    RetriesExhausted,
    ManualIntervention,
}

impl TerminalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalReason::RetriesExhausted => "retries_exhausted",
            TerminalReason::ManualIntervention => "manual_intervention",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateTransition {
    pub state: HealerState,
    pub at: DateTime<Utc>,
}

/// Retry and remediation knobs for one healer.
#[derive(Debug, Clone)]
pub struct HealerPolicy {
    /// Retries after the first execution.
    pub max_retries: u32,
    /// Base of the generic backoff wait.
    pub retry_delay: Duration,
    pub retry_step_cap: Duration,
    /// Health-check backoff, re-probing between waits.
    pub health_backoff: BackoffSchedule,
    pub stabilization_wait: Duration,
    /// Upper bound of random jitter added to generic backoff waits.
    pub jitter: Duration,
}

impl HealerPolicy {
    pub fn from_settings(settings: &HealerSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay,
            retry_step_cap: settings.backoff_step_cap,
            health_backoff: BackoffSchedule::new(
                settings.backoff_base,
                settings.backoff_step_cap,
                settings.backoff_total_cap,
            ),
            stabilization_wait: settings.stabilization_wait,
            jitter: Duration::ZERO,
        }
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Plain backoff before retry number `retry` (1-indexed).
    fn generic_delay(&self, retry: u32, rng: &mut StdRng) -> Duration {
        let base = BackoffSchedule::new(self.retry_delay, self.retry_step_cap, Duration::MAX)
            .step(retry.saturating_sub(1));
        if self.jitter.is_zero() {
            base
        } else {
            let jitter_ms = rng.gen_range(0..=self.jitter.as_millis().max(1)) as u64;
            base + Duration::from_millis(jitter_ms)
        }
    }
}

impl Default for HealerPolicy {
    fn default() -> Self {
        Self::from_settings(&HealerSettings::default())
    }
}

/// Full record of one wrapped execution.
#[derive(Debug, Clone, Serialize)]
pub struct HealingReport {
    pub episode_id: Uuid,
    pub command: String,
    pub final_state: HealerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_reason: Option<TerminalReason>,
    /// Command executions performed.
    pub executions: u32,
    pub attempts: Vec<HealingAttempt>,
    pub failures: Vec<FailureRecord>,
    pub transitions: Vec<StateTransition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
}

impl HealingReport {
    pub fn succeeded(&self) -> bool {
        self.final_state == HealerState::Success
    }

    /// `TerminalFailure` error for a failed episode.
    pub fn terminal_error(&self) -> Option<FaultlineError> {
        if self.succeeded() {
            return None;
        }
        let category = self
            .failures
            .last()
            .map(|f| f.category)
            .unwrap_or(FailureCategory::Generic);
        Some(FaultlineError::TerminalFailure {
            category,
            last_error: self.last_error.clone().unwrap_or_default(),
            attempts: self.executions,
        })
    }

    pub fn run_record(&self) -> RunRecord {
        RunRecord {
            id: self.episode_id,
            kind: RunKind::Heal,
            subject: self.command.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            duration_seconds: self.duration_seconds,
            success: self.succeeded(),
            status: match (self.final_state, self.terminal_reason) {
                (HealerState::Success, _) => "success".to_owned(),
                (HealerState::TerminalFailure, Some(reason)) => reason.as_str().to_owned(),
                (HealerState::TerminalFailure, None) => "terminal_failure".to_owned(),
                _ => "interrupted".to_owned(),
            },
            attempts: self.executions,
        }
    }
}

struct Remediation {
    strategy: HealingStrategy,
    detail: String,
}

/// Classify-heal-retry supervisor for a single command at a time.
pub struct AutoHealer<'h> {
    runner: Arc<dyn CommandRunner>,
    policy: HealerPolicy,
    probe: Option<Arc<dyn HealthProbe>>,
    fixer: Option<Arc<dyn DependencyFixer>>,
    history: Option<&'h HistoryStore>,
    metrics: Option<FaultlineMetrics>,
    rng: Mutex<StdRng>,
}

impl<'h> AutoHealer<'h> {
    pub fn new(runner: Arc<dyn CommandRunner>, policy: HealerPolicy) -> Self {
        Self {
            runner,
            policy,
            probe: None,
            fixer: None,
            history: None,
            metrics: None,
            rng: Mutex::new(StdRng::seed_from_u64(0x5EED_F1A7)),
        }
    }

    pub fn with_health_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_dependency_fixer(mut self, fixer: Arc<dyn DependencyFixer>) -> Self {
        self.fixer = Some(fixer);
        self
    }

    pub fn with_history(mut self, history: &'h HistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_metrics(mut self, metrics: Option<FaultlineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Seed the jitter RNG for deterministic runs.
    pub fn with_seed(self, seed: u64) -> Self {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
        self
    }

    pub fn policy(&self) -> &HealerPolicy {
        &self.policy
    }

    /// Run `command` until it succeeds, retries run out, or a failure needs an operator.
    ///
    /// Only cancellation is returned as an error; terminal failures are part of the report.
    pub async fn execute(&self, command: &str, token: &CancellationToken) -> Result<HealingReport> {
        let mut episode = Episode::new(command);
        episode.enter(HealerState::Pending);

        let mut retries_used = 0u32;
        // Remediation whose fate is decided by the next execution.
        let mut pending: Option<HealingAttempt> = None;

        loop {
            episode.enter(HealerState::Running);
            episode.executions += 1;
            let output = match self.runner.run(command, token).await {
                Ok(output) => output,
                Err(FaultlineError::Interrupted) => {
                    warn!(command, "wrapped command interrupted");
                    if let Some(attempt) = pending.take() {
                        self.settle(&mut episode, attempt, HealingOutcome::NotHealed);
                    }
                    self.persist_run(&episode.finish(None));
                    return Err(FaultlineError::Interrupted);
                }
                Err(err) => CommandOutput::failed(127, err.to_string()),
            };

            if output.success() {
                if let Some(attempt) = pending.take() {
                    self.settle(&mut episode, attempt, HealingOutcome::Healed);
                }
                episode.enter(HealerState::Success);
                let report = episode.finish(None);
                log_system_event(
                    Some(&LogContext::new().with_command(command).with_attempt(report.executions)),
                    "healer.episode",
                    "wrapped command succeeded",
                    SystemEventOutcome::Success,
                );
                self.persist_run(&report);
                return Ok(report);
            }

            episode.enter(HealerState::Failed);
            if let Some(attempt) = pending.take() {
                self.settle(&mut episode, attempt, HealingOutcome::NotHealed);
            }

            episode.enter(HealerState::Categorizing);
            let text = output.combined();
            let rule = matching_rule(&text);
            let category = rule.category;
            episode.last_error = Some(output.last_error_line());
            let failure = FailureRecord {
                id: Uuid::new_v4(),
                episode_id: episode.id,
                category,
                message: text,
                timestamp: Utc::now(),
                source_command: command.to_owned(),
                attempt_number: episode.executions,
            };
            self.persist(failure.clone().into());
            episode.failures.push(failure);
            let ctx = LogContext::new()
                .with_command(command)
                .with_attempt(episode.executions)
                .with_category(category.as_str());
            fl_warn!(
                context = ctx.clone(),
                "command failed (exit {:?}); classified by rule '{}'",
                output.exit_code,
                rule.name
            );

            if category == FailureCategory::Configuration {
                // Needs an operator; no retry is consumed.
                let attempt = self.new_attempt(
                    &episode,
                    category,
                    HealingStrategy::ManualIntervention,
                    retries_used + 1,
                );
                self.log_remediation(
                    &ctx,
                    HealingStrategy::ManualIntervention,
                    "surfacing for manual intervention",
                );
                self.settle(&mut episode, attempt, HealingOutcome::NotHealed);
                return Ok(self.terminate(episode, TerminalReason::ManualIntervention));
            }

            if retries_used >= self.policy.max_retries {
                return Ok(self.terminate(episode, TerminalReason::RetriesExhausted));
            }
            retries_used += 1;

            episode.enter(HealerState::Healing);
            let started = Instant::now();
            let mut attempt = self.new_attempt(&episode, category, rule.strategy, retries_used);
            self.log_remediation(&ctx, rule.strategy, "applying remediation before retry");
            let remediation = match self.remediate(category, retries_used, token).await {
                Ok(remediation) => remediation,
                Err(FaultlineError::Interrupted) => {
                    attempt.duration_seconds = started.elapsed().as_secs_f64();
                    attempt.detail = Some("interrupted during remediation".to_owned());
                    self.settle(&mut episode, attempt, HealingOutcome::NotHealed);
                    self.persist_run(&episode.finish(None));
                    return Err(FaultlineError::Interrupted);
                }
                Err(err) => Remediation {
                    strategy: rule.strategy,
                    detail: format!("remediation failed: {err}"),
                },
            };
            attempt.strategy = remediation.strategy;
            attempt.detail = Some(remediation.detail);
            attempt.duration_seconds = started.elapsed().as_secs_f64();
            fl_info!(
                context = ctx,
                "remediation {} finished in {:.2}s",
                attempt.strategy,
                attempt.duration_seconds
            );
            pending = Some(attempt);
            episode.enter(HealerState::Retrying);
        }
    }

    async fn remediate(
        &self,
        category: FailureCategory,
        retry: u32,
        token: &CancellationToken,
    ) -> Result<Remediation> {
        match category {
            FailureCategory::Dependency => self.fix_dependencies().await,
            FailureCategory::HealthCheck => self.health_backoff(retry, token).await,
            FailureCategory::Injection => {
                sleep_or_cancel(self.policy.stabilization_wait, token).await?;
                Ok(Remediation {
                    strategy: HealingStrategy::StabilizationWait,
                    detail: format!(
                        "waited {:.1}s for the target to stabilize",
                        self.policy.stabilization_wait.as_secs_f64()
                    ),
                })
            }
            FailureCategory::Generic | FailureCategory::Configuration => {
                let delay = self.policy.generic_delay(retry, &mut self.rng.lock());
                sleep_or_cancel(delay, token).await?;
                Ok(Remediation {
                    strategy: HealingStrategy::Backoff,
                    detail: format!("backed off {:.1}s", delay.as_secs_f64()),
                })
            }
        }
    }

    async fn fix_dependencies(&self) -> Result<Remediation> {
        let Some(fixer) = &self.fixer else {
            return Ok(Remediation {
                strategy: HealingStrategy::InstallDependencies,
                detail: "no dependency fixer configured; retrying as-is".to_owned(),
            });
        };
        let fix = fixer.fix().await?;
        for change in fix.manifest_changes {
            self.persist(change.into());
        }
        Ok(Remediation {
            strategy: HealingStrategy::InstallDependencies,
            detail: fix.detail,
        })
    }

    /// Without a probe a single backoff step is waited; with one, waits continue until
    /// the endpoint answers or the total cap is spent.
    async fn health_backoff(&self, retry: u32, token: &CancellationToken) -> Result<Remediation> {
        let schedule = self.policy.health_backoff;
        let Some(probe) = &self.probe else {
            let delay = schedule.step(retry.saturating_sub(1)).min(schedule.total_cap);
            sleep_or_cancel(delay, token).await?;
            return Ok(Remediation {
                strategy: HealingStrategy::HealthBackoff,
                detail: format!("backed off {:.1}s (no health probe configured)", delay.as_secs_f64()),
            });
        };
        let mut waited = Duration::ZERO;
        let mut probes = 0u32;
        for delay in schedule.delays() {
            sleep_or_cancel(delay, token).await?;
            waited += delay;
            probes += 1;
            let sample = probe.probe().await;
            debug!(success = sample.success, latency_ms = sample.latency_ms, "health re-probe");
            if sample.success {
                return Ok(Remediation {
                    strategy: HealingStrategy::HealthBackoff,
                    detail: format!(
                        "health endpoint recovered after {:.1}s ({probes} probe(s))",
                        waited.as_secs_f64()
                    ),
                });
            }
        }
        Ok(Remediation {
            strategy: HealingStrategy::HealthBackoff,
            detail: format!(
                "health endpoint still failing after {:.1}s ({probes} probe(s))",
                waited.as_secs_f64()
            ),
        })
    }

    fn new_attempt(
        &self,
        episode: &Episode,
        category: FailureCategory,
        strategy: HealingStrategy,
        attempt_number: u32,
    ) -> HealingAttempt {
        HealingAttempt {
            id: Uuid::new_v4(),
            episode_id: episode.id,
            failure_category: category,
            strategy,
            attempt_number,
            outcome: HealingOutcome::NotHealed,
            duration_seconds: 0.0,
            started_at: Utc::now(),
            detail: None,
        }
    }

    fn log_remediation(&self, ctx: &LogContext, strategy: HealingStrategy, message: &str) {
        let message = format!("{message}: {strategy}");
        log_system_event(
            Some(ctx),
            "healer.remediation",
            &message,
            SystemEventOutcome::Degraded,
        );
    }

    fn settle(&self, episode: &mut Episode, mut attempt: HealingAttempt, outcome: HealingOutcome) {
        attempt.outcome = outcome;
        if let Some(metrics) = &self.metrics {
            metrics.record_healing_attempt(attempt.failure_category.as_str(), outcome.is_healed());
        }
        self.persist(attempt.clone().into());
        episode.attempts.push(attempt);
    }

    fn terminate(&self, mut episode: Episode, reason: TerminalReason) -> HealingReport {
        episode.enter(HealerState::TerminalFailure);
        let report = episode.finish(Some(reason));
        let category = report
            .failures
            .last()
            .map(|f| f.category.as_str())
            .unwrap_or("generic");
        let ctx = LogContext::new()
            .with_command(&report.command)
            .with_attempt(report.executions)
            .with_category(category);
        let message = format!(
            "{}: {}",
            reason.as_str(),
            report.last_error.as_deref().unwrap_or("no error output")
        );
        log_system_event(Some(&ctx), "healer.terminal_failure", &message, SystemEventOutcome::Fault);
        self.persist_run(&report);
        report
    }

    fn persist(&self, record: HistoryRecord) {
        if let Some(history) = self.history {
            if let Err(err) = history.append(record) {
                warn!(error = %err, "failed to append healer record to history");
            }
        }
    }

    fn persist_run(&self, report: &HealingReport) {
        self.persist(report.run_record().into());
    }
}

struct Episode {
    id: Uuid,
    command: String,
    started_at: DateTime<Utc>,
    clock: Instant,
    executions: u32,
    attempts: Vec<HealingAttempt>,
    failures: Vec<FailureRecord>,
    transitions: Vec<StateTransition>,
    last_error: Option<String>,
    state: HealerState,
}

impl Episode {
    fn new(command: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            command: command.to_owned(),
            started_at: Utc::now(),
            clock: Instant::now(),
            executions: 0,
            attempts: Vec::new(),
            failures: Vec::new(),
            transitions: Vec::new(),
            last_error: None,
            state: HealerState::Pending,
        }
    }

    fn enter(&mut self, state: HealerState) {
        debug!(episode = %self.id, from = ?self.state, to = ?state, "healer transition");
        self.state = state;
        self.transitions.push(StateTransition {
            state,
            at: Utc::now(),
        });
    }

    fn finish(&self, reason: Option<TerminalReason>) -> HealingReport {
        let finished_at = Utc::now();
        HealingReport {
            episode_id: self.id,
            command: self.command.clone(),
            final_state: self.state,
            terminal_reason: reason,
            executions: self.executions,
            attempts: self.attempts.clone(),
            failures: self.failures.clone(),
            transitions: self.transitions.clone(),
            last_error: if self.state == HealerState::Success {
                None
            } else {
                self.last_error.clone()
            },
            started_at: self.started_at,
            finished_at,
            duration_seconds: seconds_between(self.started_at, finished_at)
                .max(self.clock.elapsed().as_secs_f64()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingFixer, ScriptedRunner};

    fn fast_policy(max_retries: u32) -> HealerPolicy {
        HealerPolicy {
            max_retries,
            retry_delay: Duration::from_millis(1),
            retry_step_cap: Duration::from_millis(5),
            health_backoff: BackoffSchedule::new(
                Duration::from_millis(1),
                Duration::from_millis(2),
                Duration::from_millis(10),
            ),
            stabilization_wait: Duration::from_millis(1),
            jitter: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn first_run_success_has_no_attempts() {
        let runner = Arc::new(ScriptedRunner::new([CommandOutput::succeeded("ok")]));
        let healer = AutoHealer::new(runner.clone(), fast_policy(3));
        let report = healer.execute("true", &CancellationToken::new()).await.unwrap();
        assert!(report.succeeded());
        assert_eq!(report.executions, 1);
        assert!(report.attempts.is_empty());
        let states: Vec<_> = report.transitions.iter().map(|t| t.state).collect();
        assert_eq!(
            states,
            vec![HealerState::Pending, HealerState::Running, HealerState::Success]
        );
    }

    #[tokio::test]
    async fn dependency_failures_are_fixed_then_retried() {
        let runner = Arc::new(ScriptedRunner::new([
            CommandOutput::failed(1, "ModuleNotFoundError: No module named 'yaml'"),
            CommandOutput::failed(1, "ImportError: cannot import name 'CLoader'"),
            CommandOutput::succeeded("done"),
        ]));
        let fixer = Arc::new(RecordingFixer::default());
        let healer = AutoHealer::new(runner.clone(), fast_policy(3))
            .with_dependency_fixer(fixer.clone());
        let report = healer.execute("python job.py", &CancellationToken::new()).await.unwrap();

        assert_eq!(report.final_state, HealerState::Success);
        assert_eq!(report.attempts.len(), 2);
        assert_eq!(fixer.calls(), 2);
        assert!(report
            .attempts
            .iter()
            .all(|a| a.failure_category == FailureCategory::Dependency
                && a.strategy == HealingStrategy::InstallDependencies));
        assert_eq!(report.attempts[0].attempt_number, 1);
        assert_eq!(report.attempts[0].outcome, HealingOutcome::NotHealed);
        assert_eq!(report.attempts[1].attempt_number, 2);
        assert_eq!(report.attempts[1].outcome, HealingOutcome::Healed);
        assert!(report.last_error.is_none());
    }

    #[tokio::test]
    async fn exhausted_retries_end_in_terminal_failure() {
        let runner = Arc::new(ScriptedRunner::repeating(CommandOutput::failed(
            2,
            "Segmentation fault (core dumped)",
        )));
        let healer = AutoHealer::new(runner.clone(), fast_policy(2));
        let report = healer.execute("./flaky", &CancellationToken::new()).await.unwrap();

        assert_eq!(report.final_state, HealerState::TerminalFailure);
        assert_eq!(report.terminal_reason, Some(TerminalReason::RetriesExhausted));
        assert_eq!(report.executions, 3);
        assert_eq!(report.attempts.len(), 2);
        assert!(report.attempts.iter().all(|a| a.strategy == HealingStrategy::Backoff));
        match report.terminal_error() {
            Some(FaultlineError::TerminalFailure {
                category,
                last_error,
                attempts,
            }) => {
                assert_eq!(category, FailureCategory::Generic);
                assert_eq!(last_error, "Segmentation fault (core dumped)");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected terminal error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn configuration_failure_stops_without_consuming_a_retry() {
        let runner = Arc::new(ScriptedRunner::repeating(CommandOutput::failed(
            1,
            "FileNotFoundError: chaos.toml",
        )));
        let healer = AutoHealer::new(runner.clone(), fast_policy(3));
        let report = healer.execute("faultlinectl inject", &CancellationToken::new()).await.unwrap();
        assert_eq!(runner.calls(), 1);
        assert_eq!(report.terminal_reason, Some(TerminalReason::ManualIntervention));
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.attempts[0].strategy, HealingStrategy::ManualIntervention);
        assert_eq!(report.failures[0].category, FailureCategory::Configuration);
    }

    #[tokio::test]
    async fn health_backoff_reprobes_until_healthy() {
        use faultline_injector::testing::ScriptedProbe;

        let runner = Arc::new(ScriptedRunner::new([
            CommandOutput::failed(7, "curl: (7) Failed to connect: Connection refused"),
            CommandOutput::succeeded(""),
        ]));
        let probe = Arc::new(ScriptedProbe::from_script([false, false, true]));
        let healer = AutoHealer::new(runner.clone(), fast_policy(1)).with_health_probe(probe.clone());
        let report = healer.execute("curl -f localhost/health", &CancellationToken::new()).await.unwrap();
        assert!(report.succeeded());
        assert_eq!(probe.calls(), 3);
        assert_eq!(report.attempts[0].strategy, HealingStrategy::HealthBackoff);
        assert!(report.attempts[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("recovered"));
    }

    #[tokio::test]
    async fn cancellation_during_backoff_is_propagated() {
        let runner = Arc::new(ScriptedRunner::repeating(CommandOutput::failed(1, "boom")));
        let mut policy = fast_policy(3);
        policy.retry_delay = Duration::from_secs(30);
        policy.retry_step_cap = Duration::from_secs(30);
        let healer = AutoHealer::new(runner.clone(), policy);
        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });
        let result = healer.execute("boom", &token).await;
        assert!(matches!(result, Err(FaultlineError::Interrupted)));
        assert_eq!(runner.calls(), 1);
    }
}
