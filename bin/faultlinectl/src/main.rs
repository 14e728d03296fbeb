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

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use faultline_common::init_tracing;

mod context;
mod heal;
mod inject;
mod report;
mod sentinel;
mod validate;

use context::CliContext;

/// Exit status when a cancellation signal stopped the command.
pub(crate) const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "faultline chaos, SLO validation, and self-healing utility",
    long_about = None
)]
struct Cli {
    /// Tool configuration file (falls back to FAULTLINE_CONFIG, then ./faultline.toml).
    #[arg(long = "tool-config", value_name = "FILE", global = true)]
    tool_config: Option<PathBuf>,

    /// Override the history store path from the tool configuration.
    #[arg(long, value_name = "FILE", global = true)]
    history: Option<PathBuf>,

    /// Write the Prometheus text exposition here after the command completes.
    #[arg(long = "metrics-out", value_name = "FILE", global = true)]
    metrics_out: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Apply fault scenarios to a target and record probe results")]
    Inject(inject::InjectCommand),
    #[command(about = "Evaluate an injection results document against SLO thresholds")]
    Validate(validate::ValidateCommand),
    #[command(about = "Run a command under the auto-healer retry loop")]
    Heal(heal::HealCommand),
    #[command(about = "Generate the weekly trend report from history")]
    Report(report::ReportCommand),
    #[command(about = "Reconcile source imports against a requirements manifest")]
    Sentinel(sentinel::SentinelCommand),
}

impl Commands {
    fn service_name(&self) -> &'static str {
        match self {
            Commands::Inject(_) => "inject",
            Commands::Validate(_) => "validate",
            Commands::Heal(_) => "heal",
            Commands::Report(_) => "report",
            Commands::Sentinel(_) => "sentinel",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let ctx = CliContext::load(cli.tool_config, cli.history, cli.metrics_out)?;
    init_tracing(cli.command.service_name(), &ctx.config.logging)
        .context("failed to initialise tracing")?;
    if let Some(source) = &ctx.config_source {
        tracing::debug!(config = %source.display(), "tool configuration loaded");
    }

    let code = match cli.command {
        Commands::Inject(cmd) => inject::run(cmd, &ctx)?,
        Commands::Validate(cmd) => validate::run(cmd, &ctx)?,
        Commands::Heal(cmd) => heal::run(cmd, &ctx)?,
        Commands::Report(cmd) => report::run(cmd, &ctx)?,
        Commands::Sentinel(cmd) => sentinel::run(cmd, &ctx)?,
    };
    ctx.flush_metrics()?;
    Ok(code)
}
