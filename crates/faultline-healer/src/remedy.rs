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

use async_trait::async_trait;
use faultline_common::{FaultlineError, Result};
use faultline_history::ManifestChange;
use faultline_sentinel::DependencySentinel;

/// Outcome of one dependency remediation.
#[derive(Debug, Clone, Default)]
pub struct DependencyFix {
    pub detail: String,
    pub manifest_changes: Vec<ManifestChange>,
}

/// Remediation for `dependency` failures.
#[async_trait]
pub trait DependencyFixer: Send + Sync {
    async fn fix(&self) -> Result<DependencyFix>;
}

/// Runs the dependency sentinel in fix + install mode on a blocking thread.
pub struct SentinelFixer {
    sentinel: Arc<DependencySentinel>,
}

impl SentinelFixer {
    pub fn new(sentinel: DependencySentinel) -> Self {
        Self {
            sentinel: Arc::new(sentinel),
        }
    }
}

#[async_trait]
impl DependencyFixer for SentinelFixer {
    async fn fix(&self) -> Result<DependencyFix> {
        let sentinel = self.sentinel.clone();
        let report = tokio::task::spawn_blocking(move || sentinel.fix(true))
            .await
            .map_err(|err| FaultlineError::Dependency(format!("sentinel task failed: {err}")))?
            .map_err(|err| FaultlineError::Dependency(err.to_string()))?;

        let failed: Vec<&str> = report
            .failed_installs()
            .map(|o| o.package.as_str())
            .collect();
        let detail = if report.added.is_empty() {
            format!(
                "manifest already declares all {} third-party module(s)",
                report.third_party_modules.len()
            )
        } else if failed.is_empty() {
            format!("added and installed: {}", report.added.join(", "))
        } else {
            format!(
                "added: {}; install failed for: {}",
                report.added.join(", "),
                failed.join(", ")
            )
        };
        Ok(DependencyFix {
            detail,
            manifest_changes: report.manifest_changes(),
        })
    }
}
