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
use chrono::Utc;
use clap::{ArgAction, Args};
use faultline_common::time::seconds_between;
use faultline_common::ThresholdsDocument;
use faultline_history::{RunKind, RunRecord};
use faultline_injector::InjectionRun;
use faultline_reporter::write_report;
use faultline_validator::{enforce, Enforcement, ResilienceValidator, ValidationVerdict};
use uuid::Uuid;

use crate::context::{print_json, CliContext};

#[derive(Debug, Args)]
pub struct ValidateCommand {
    /// Results document written by `inject`.
    #[arg(long, value_name = "FILE")]
    results: PathBuf,

    /// Thresholds document, or a scenario document whose `slo` table is used.
    #[arg(long, value_name = "FILE")]
    thresholds: PathBuf,

    /// Exit non-zero when any SLO is breached.
    #[arg(long = "fail-on-violation", action = ArgAction::SetTrue)]
    fail_on_violation: bool,

    /// Consecutive successful probes that count as recovered.
    #[arg(long = "stabilization-successes", value_name = "N")]
    stabilization_successes: Option<u32>,

    /// Also write the verdict to this file.
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

pub fn run(cmd: ValidateCommand, ctx: &CliContext) -> Result<ExitCode> {
    let started_at = Utc::now();
    let run = InjectionRun::from_path(&cmd.results)?;
    let thresholds = ThresholdsDocument::from_path(&cmd.thresholds)?;

    let mut validator = ResilienceValidator::new(thresholds.slo);
    // The flag wins; otherwise the scenario document keeps inject and validate in agreement.
    if let Some(successes) = cmd.stabilization_successes.or(thresholds.stabilization_successes) {
        validator = validator.with_stabilization_successes(successes);
    }
    let verdict = validator.validate(&run);

    let history = ctx.history()?;
    ctx.record(&history, vec![run_record(&cmd, &verdict, started_at).into()]);

    if let Some(path) = &cmd.output {
        write_report(path, &verdict)
            .with_context(|| format!("failed to write verdict to {}", path.display()))?;
    }

    let mode = if cmd.fail_on_violation {
        Enforcement::FailOnViolation
    } else {
        Enforcement::Report
    };
    match enforce(verdict, mode) {
        Ok(verdict) => {
            print_json(&verdict)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(violation) => {
            print_json(&violation.verdict)?;
            eprintln!("{violation}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_record(
    cmd: &ValidateCommand,
    verdict: &ValidationVerdict,
    started_at: chrono::DateTime<Utc>,
) -> RunRecord {
    let passed = verdict.overall_pass();
    RunRecord {
        id: Uuid::new_v4(),
        kind: RunKind::Validate,
        subject: cmd.results.display().to_string(),
        started_at,
        finished_at: verdict.evaluated_at,
        duration_seconds: seconds_between(started_at, verdict.evaluated_at),
        success: passed,
        status: if passed { "passed" } else { "failed" }.to_owned(),
        attempts: 1,
    }
}
