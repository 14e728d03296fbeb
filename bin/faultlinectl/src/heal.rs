//! ---
//! fl_section: "08-cli"
//! fl_subsection: "binary"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Control CLI for fault injection, validation, healing, and reporting."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Args;
use faultline_common::{install_shutdown_handler, CancellationToken, FaultlineError};
use faultline_healer::{AutoHealer, HealerPolicy, SentinelFixer, ShellCommandRunner};
use faultline_injector::HttpHealthProbe;
use faultline_sentinel::DependencySentinel;
use tokio::runtime::Runtime;
use url::Url;

use crate::context::{print_json, CliContext};
use crate::EXIT_INTERRUPTED;

#[derive(Debug, Args)]
pub struct HealCommand {
    /// Shell command to run and heal.
    #[arg(long, value_name = "CMD")]
    command: String,

    /// Retries after the first execution (overrides tool configuration).
    #[arg(long = "max-retries", value_name = "N")]
    max_retries: Option<u32>,

    /// Seconds between generic retries (overrides tool configuration).
    #[arg(long = "retry-delay", value_name = "SECONDS")]
    retry_delay: Option<f64>,

    /// Health endpoint re-probed while backing off from health check failures.
    #[arg(long = "health-url", value_name = "URL")]
    health_url: Option<Url>,
}

pub fn run(cmd: HealCommand, ctx: &CliContext) -> Result<ExitCode> {
    let settings = &ctx.config.healer;
    let mut policy = HealerPolicy::from_settings(settings);
    if let Some(retries) = cmd.max_retries {
        policy = policy.with_max_retries(retries);
    }
    if let Some(seconds) = cmd.retry_delay {
        let delay = Duration::try_from_secs_f64(seconds)
            .map_err(|_| anyhow!("--retry-delay must be a non-negative number of seconds"))?;
        policy = policy.with_retry_delay(delay);
    }

    let health_url = match cmd.health_url {
        Some(url) => Some(url),
        None => settings
            .health_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|err| anyhow!("invalid healer.health_url: {err}"))?,
    };

    let history = ctx.history()?;
    let sentinel = DependencySentinel::from_settings(&ctx.config.sentinel);
    let mut healer = AutoHealer::new(Arc::new(ShellCommandRunner::new()), policy)
        .with_dependency_fixer(Arc::new(SentinelFixer::new(sentinel)))
        .with_history(&history)
        .with_metrics(ctx.metrics());
    if let Some(url) = &health_url {
        let probe = HttpHealthProbe::new(url, "", settings.health_timeout)?;
        healer = healer.with_health_probe(Arc::new(probe));
    }

    let runtime = Runtime::new()?;
    let outcome = runtime.block_on(async {
        let token = CancellationToken::new();
        let handler = install_shutdown_handler(token.clone());
        let outcome = healer.execute(&cmd.command, &token).await;
        handler.abort();
        outcome
    });

    match outcome {
        Ok(report) => {
            print_json(&report)?;
            if let Some(err) = report.terminal_error() {
                eprintln!("{err}");
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(FaultlineError::Interrupted) => {
            eprintln!("healing interrupted; partial history was recorded");
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
        Err(err) => Err(err.into()),
    }
}
