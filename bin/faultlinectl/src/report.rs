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
use chrono::{DateTime, Utc};
use clap::Args;
use faultline_history::ImportSummary;
use faultline_logging::{log_system_event, SystemEventOutcome};
use faultline_reporter::{write_report, ReportWindow, WeeklyReporter, DEFAULT_LOOKBACK_DAYS};
use serde::Serialize;

use crate::context::{print_json, CliContext};

#[derive(Debug, Args)]
pub struct ReportCommand {
    /// Days of history covered by the report.
    #[arg(long = "lookback-days", value_name = "N", default_value_t = DEFAULT_LOOKBACK_DAYS)]
    lookback_days: i64,

    /// JSON export to merge into history first; known ids are skipped.
    #[arg(long = "import", value_name = "FILE")]
    import: Option<PathBuf>,

    /// Exclusive end of the window as RFC3339 (defaults to now).
    #[arg(long, value_name = "RFC3339")]
    until: Option<DateTime<Utc>>,

    /// Report destination.
    #[arg(long, value_name = "FILE", default_value = "weekly-report.json")]
    output: PathBuf,
}

#[derive(Debug, Serialize)]
struct ReportSummary<'a> {
    output: &'a PathBuf,
    window: &'a ReportWindow,
    #[serde(skip_serializing_if = "Option::is_none")]
    imported: Option<ImportSummary>,
    total_runs: usize,
    success_rate_percent: Option<f64>,
    recommendations: usize,
}

pub fn run(cmd: ReportCommand, ctx: &CliContext) -> Result<ExitCode> {
    let history = ctx.history()?;
    let imported = match &cmd.import {
        Some(path) => Some(
            history
                .import(path)
                .with_context(|| format!("failed to import history from {}", path.display()))?,
        ),
        None => None,
    };

    let reporter = WeeklyReporter::new(&history).with_lookback_days(cmd.lookback_days)?;
    let report = match cmd.until {
        Some(until) => reporter.generate(until)?,
        None => reporter.generate_now()?,
    };
    write_report(&cmd.output, &report)?;

    log_system_event(
        None,
        "report.written",
        &format!(
            "weekly report over {} day(s) written to {}",
            report.window.lookback_days,
            cmd.output.display()
        ),
        SystemEventOutcome::Success,
    );
    print_json(&ReportSummary {
        output: &cmd.output,
        window: &report.window,
        imported,
        total_runs: report.summary.total_runs,
        success_rate_percent: report.summary.success_rate_percent,
        recommendations: report.recommendations.len(),
    })?;
    Ok(ExitCode::SUCCESS)
}
