//! ---
//! fl_section: "08-cli"
//! fl_subsection: "binary"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Control CLI for fault injection, validation, healing, and reporting."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgAction, Args, ValueEnum};
use faultline_common::time::seconds_between;
use faultline_common::{install_shutdown_handler, CancellationToken, ScenarioDocument};
use faultline_history::{RunKind, RunRecord};
use faultline_injector::{
    select_load_generator, Capabilities, FaultInjector, HttpHealthProbe, InjectionOutcome,
    InjectionRun, InjectorSettings, LoadGeneratorPolicy, NetworkImpairer, RunStatus,
    ShellDisruptor, SimulatedNetwork, Target, TcNetemImpairer,
};
use faultline_logging::{log_system_event, SystemEventOutcome};
use serde::Serialize;
use tokio::runtime::Runtime;
use tracing::warn;
use url::Url;
use uuid::Uuid;

use crate::context::{print_json, CliContext};
use crate::EXIT_INTERRUPTED;

/// Exit status when abort conditions skipped the remaining scenarios.
const EXIT_ABORTED: u8 = 2;

#[derive(Debug, Args)]
pub struct InjectCommand {
    /// Scenario configuration document (TOML, or YAML by extension).
    #[arg(long, value_name = "FILE")]
    config: PathBuf,

    /// Base URL of the service under test.
    #[arg(long, value_name = "URL")]
    target: Url,

    /// Validate and describe scenarios without touching the host or target.
    #[arg(long = "dry-run", action = ArgAction::SetTrue)]
    dry_run: bool,

    /// Run only the named scenario.
    #[arg(long, value_name = "NAME")]
    scenario: Option<String>,

    /// Run only the scenarios of the named group.
    #[arg(long, value_name = "NAME")]
    group: Option<String>,

    /// Results document, flushed after every scenario.
    #[arg(long, value_name = "FILE", default_value = "chaos-results.json")]
    output: PathBuf,

    /// Load generator used for cpu, memory, and disk scenarios.
    #[arg(long = "load-generator", value_enum, default_value_t = LoadGeneratorArg::Auto)]
    load_generator: LoadGeneratorArg,

    /// Network impairment backend.
    #[arg(long, value_enum, default_value_t = NetworkArg::Auto)]
    network: NetworkArg,

    /// Process id of the target, used by process_crash scenarios.
    #[arg(long, value_name = "PID")]
    pid: Option<u32>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LoadGeneratorArg {
    Auto,
    InProcess,
    StressNg,
}

impl From<LoadGeneratorArg> for LoadGeneratorPolicy {
    fn from(value: LoadGeneratorArg) -> Self {
        match value {
            LoadGeneratorArg::Auto => LoadGeneratorPolicy::Auto,
            LoadGeneratorArg::InProcess => LoadGeneratorPolicy::InProcess,
            LoadGeneratorArg::StressNg => LoadGeneratorPolicy::StressNg,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NetworkArg {
    /// `tc` when it is on PATH, simulated otherwise.
    Auto,
    Tc,
    Simulated,
}

impl NetworkArg {
    fn resolve(self) -> Arc<dyn NetworkImpairer> {
        match self {
            NetworkArg::Tc => Arc::new(TcNetemImpairer::new()),
            NetworkArg::Simulated => Arc::new(SimulatedNetwork::new()),
            NetworkArg::Auto if TcNetemImpairer::is_available() => Arc::new(TcNetemImpairer::new()),
            NetworkArg::Auto => {
                warn!("tc not found on PATH; network scenarios will be simulated");
                Arc::new(SimulatedNetwork::new())
            }
        }
    }
}

/// Summary printed on stdout once the run document is written.
#[derive(Debug, Serialize)]
struct InjectSummary<'a> {
    run_id: Uuid,
    status: RunStatus,
    dry_run: bool,
    output: &'a PathBuf,
    succeeded: usize,
    failed: usize,
    skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    abort_reason: Option<&'a str>,
}

pub fn run(cmd: InjectCommand, ctx: &CliContext) -> Result<ExitCode> {
    let document = ScenarioDocument::from_path(&cmd.config)
        .with_context(|| format!("invalid scenario document {}", cmd.config.display()))?;
    let scenarios = document.select(cmd.scenario.as_deref(), cmd.group.as_deref())?;

    let settings = InjectorSettings::from_document(&document).with_results_path(&cmd.output);
    let target = Target::new(cmd.target.clone()).with_process_id(cmd.pid);
    let probe = HttpHealthProbe::new(&cmd.target, &document.probe.path, document.probe.timeout)?;
    let capabilities = Capabilities {
        probe: Arc::new(probe),
        load: select_load_generator(cmd.load_generator.into())?,
        network: cmd.network.resolve(),
        disruptor: Arc::new(ShellDisruptor::new()),
    };
    let injector = FaultInjector::new(settings, target, capabilities, ctx.metrics());

    let run = if cmd.dry_run {
        injector.dry_run(&scenarios)
    } else {
        let runtime = Runtime::new()?;
        runtime.block_on(async {
            let token = CancellationToken::new();
            let handler = install_shutdown_handler(token.clone());
            let run = injector.run(&scenarios, &token).await;
            handler.abort();
            run
        })
    };
    run.write_to(&cmd.output)
        .with_context(|| format!("failed to write results to {}", cmd.output.display()))?;

    if !run.dry_run {
        let history = ctx.history()?;
        ctx.record(&history, vec![run_record(&run, &cmd.target).into()]);
    }

    let outcome = match run.status {
        RunStatus::Completed => SystemEventOutcome::Success,
        RunStatus::PartiallyComplete => SystemEventOutcome::Degraded,
        RunStatus::Interrupted => SystemEventOutcome::Fault,
    };
    log_system_event(
        None,
        "inject.complete",
        &format!("injection run {} {}", run.run_id, run.status.as_str()),
        outcome,
    );

    print_json(&InjectSummary {
        run_id: run.run_id,
        status: run.status,
        dry_run: run.dry_run,
        output: &cmd.output,
        succeeded: run.count(InjectionOutcome::Success),
        failed: run.count(InjectionOutcome::Failure),
        skipped: run.count(InjectionOutcome::Skipped),
        abort_reason: run.abort_reason.as_deref(),
    })?;

    Ok(match run.status {
        RunStatus::Completed => ExitCode::SUCCESS,
        RunStatus::PartiallyComplete => ExitCode::from(EXIT_ABORTED),
        RunStatus::Interrupted => ExitCode::from(EXIT_INTERRUPTED),
    })
}

fn run_record(run: &InjectionRun, target: &Url) -> RunRecord {
    let finished_at = run.finished_at.unwrap_or_else(Utc::now);
    RunRecord {
        id: run.run_id,
        kind: RunKind::Inject,
        subject: target.to_string(),
        started_at: run.started_at,
        finished_at,
        duration_seconds: seconds_between(run.started_at, finished_at),
        success: run.status == RunStatus::Completed,
        status: run.status.as_str().to_owned(),
        attempts: run.executed().count() as u32,
    }
}
