//! ---
//! fl_section: "06-dependency-sentinel"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Dependency sentinel: import scanning and manifest reconciliation."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::process::Command;

use serde::Serialize;
use tracing::{info, warn};

/// Result of installing one package. Failures never abort the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallOutcome {
    pub package: String,
    pub requirement: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Installs a single requirement line.
pub trait PackageInstaller: Send + Sync {
    fn install(&self, requirement: &str) -> std::result::Result<(), String>;
}

/// `python3 -m pip install <requirement>` by default.
#[derive(Debug, Clone)]
pub struct PipInstaller {
    program: String,
    args: Vec<String>,
}

impl PipInstaller {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Default for PipInstaller {
    fn default() -> Self {
        Self::new("python3", vec!["-m".into(), "pip".into(), "install".into()])
    }
}

impl PackageInstaller for PipInstaller {
    fn install(&self, requirement: &str) -> std::result::Result<(), String> {
        info!(program = %self.program, requirement, "installing package");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(requirement)
            .output()
            .map_err(|err| format!("failed to launch {}: {err}", self.program))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("installer exited unsuccessfully")
            .trim()
            .to_owned();
        warn!(requirement, status = ?output.status.code(), %detail, "package install failed");
        Err(detail)
    }
}

pub(crate) fn install_each(
    installer: &dyn PackageInstaller,
    requirements: &[(String, String)],
) -> Vec<InstallOutcome> {
    requirements
        .iter()
        .map(|(package, requirement)| match installer.install(requirement) {
            Ok(()) => InstallOutcome {
                package: package.clone(),
                requirement: requirement.clone(),
                success: true,
                detail: None,
            },
            Err(detail) => InstallOutcome {
                package: package.clone(),
                requirement: requirement.clone(),
                success: false,
                detail: Some(detail),
            },
        })
        .collect()
}
