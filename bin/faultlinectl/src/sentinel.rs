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

use anyhow::Result;
use clap::{ArgAction, Args};
use faultline_history::HistoryRecord;
use faultline_sentinel::{DependencySentinel, SentinelMode};

use crate::context::{print_json, CliContext};

#[derive(Debug, Args)]
pub struct SentinelCommand {
    /// Source tree to scan (defaults to sentinel.source_root).
    #[arg(long, value_name = "DIR")]
    source: Option<PathBuf>,

    /// Requirements manifest (defaults to sentinel.manifest).
    #[arg(long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Append missing packages to the manifest.
    #[arg(long, action = ArgAction::SetTrue)]
    fix: bool,

    /// Install each appended package; implies --fix.
    #[arg(long, action = ArgAction::SetTrue)]
    install: bool,

    /// Additional first-party module names to ignore.
    #[arg(long = "internal", value_name = "MODULE", num_args = 1..)]
    internal: Vec<String>,
}

pub fn run(cmd: SentinelCommand, ctx: &CliContext) -> Result<ExitCode> {
    let mut settings = ctx.config.sentinel.clone();
    if let Some(source) = cmd.source {
        settings.source_root = source;
    }
    if let Some(manifest) = cmd.manifest {
        settings.manifest = manifest;
    }
    settings.internal_modules.extend(cmd.internal);

    let mode = SentinelMode::from_flags(cmd.fix, cmd.install);
    let report = DependencySentinel::from_settings(&settings).run(mode)?;

    let changes: Vec<HistoryRecord> = report
        .manifest_changes()
        .into_iter()
        .map(HistoryRecord::from)
        .collect();
    if !changes.is_empty() {
        let history = ctx.history()?;
        ctx.record(&history, changes);
    }

    print_json(&report)?;
    let unresolved = mode == SentinelMode::Check && !report.is_clean();
    let failed_installs = report.failed_installs().next().is_some();
    Ok(if unresolved || failed_installs {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
