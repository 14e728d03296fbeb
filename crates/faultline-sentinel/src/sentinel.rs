//! ---
//! fl_section: "06-dependency-sentinel"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Dependency sentinel: import scanning and manifest reconciliation."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use faultline_common::SentinelSettings;
use faultline_history::ManifestChange;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::installer::{install_each, InstallOutcome, PackageInstaller, PipInstaller};
use crate::manifest::{normalize_package_name, Manifest};
use crate::mapping::resolve_package;
use crate::scan::scan_tree;
use crate::stdlib::is_stdlib_module;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SentinelMode {
    /// Report missing packages only.
    Check,
    /// Append missing packages to the manifest.
    Fix,
    /// Append, then install each newly added package.
    FixAndInstall,
}

impl SentinelMode {
    pub fn from_flags(fix: bool, install: bool) -> Self {
        match (fix, install) {
            (_, true) => SentinelMode::FixAndInstall,
            (true, false) => SentinelMode::Fix,
            (false, false) => SentinelMode::Check,
        }
    }

    fn fixes(&self) -> bool {
        !matches!(self, SentinelMode::Check)
    }
}

/// Third-party package imported by the source tree but absent from the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingPackage {
    pub module: String,
    pub package: String,
    pub requirement: String,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentinelReport {
    pub mode: SentinelMode,
    pub source_root: PathBuf,
    pub manifest: PathBuf,
    pub generated_at: DateTime<Utc>,
    pub scanned_files: usize,
    pub third_party_modules: Vec<String>,
    pub missing: Vec<MissingPackage>,
    /// Lines appended to the manifest by this run.
    pub added: Vec<String>,
    pub install_outcomes: Vec<InstallOutcome>,
    pub warnings: Vec<String>,
}

impl SentinelReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn failed_installs(&self) -> impl Iterator<Item = &InstallOutcome> {
        self.install_outcomes.iter().filter(|o| !o.success)
    }

    /// History records for every line this run appended.
    pub fn manifest_changes(&self) -> Vec<ManifestChange> {
        self.missing
            .iter()
            .filter(|m| self.added.contains(&m.requirement))
            .map(|m| ManifestChange {
                id: Uuid::new_v4(),
                timestamp: self.generated_at,
                manifest: self.manifest.display().to_string(),
                module: m.module.clone(),
                package: m.package.clone(),
                requirement: m.requirement.clone(),
                installed: self
                    .install_outcomes
                    .iter()
                    .find(|o| o.requirement == m.requirement)
                    .map(|o| o.success),
            })
            .collect()
    }
}

/// Reconciles a source tree's imports against a requirements manifest.
pub struct DependencySentinel {
    source_root: PathBuf,
    manifest: PathBuf,
    internal_modules: BTreeSet<String>,
    lock_timeout: Duration,
    installer: Arc<dyn PackageInstaller>,
}

impl DependencySentinel {
    pub fn new(source_root: impl Into<PathBuf>, manifest: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            manifest: manifest.into(),
            internal_modules: BTreeSet::new(),
            lock_timeout: Duration::from_secs(10),
            installer: Arc::new(PipInstaller::default()),
        }
    }

    pub fn from_settings(settings: &SentinelSettings) -> Self {
        Self::new(&settings.source_root, &settings.manifest)
            .with_internal_modules(settings.internal_modules.iter().cloned())
            .with_lock_timeout(settings.lock_timeout)
            .with_installer(Arc::new(PipInstaller::new(
                settings.installer_program.clone(),
                settings.installer_args.clone(),
            )))
    }

    pub fn with_internal_modules(mut self, modules: impl IntoIterator<Item = String>) -> Self {
        self.internal_modules.extend(modules);
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_installer(mut self, installer: Arc<dyn PackageInstaller>) -> Self {
        self.installer = installer;
        self
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest
    }

    pub fn check(&self) -> Result<SentinelReport> {
        self.run(SentinelMode::Check)
    }

    pub fn fix(&self, install: bool) -> Result<SentinelReport> {
        self.run(SentinelMode::from_flags(true, install))
    }

    pub fn run(&self, mode: SentinelMode) -> Result<SentinelReport> {
        let scan = scan_tree(&self.source_root)?;
        let mut warnings = scan.warnings.clone();

        // Several modules can share one distribution (e.g. `google.*`); first module wins.
        let mut by_package: BTreeMap<String, MissingPackage> = BTreeMap::new();
        let mut third_party = Vec::new();
        let manifest = Manifest::load(&self.manifest)?;

        for (module, files) in &scan.modules {
            if is_stdlib_module(module)
                || scan.local_modules.contains(module)
                || self.internal_modules.contains(module)
            {
                continue;
            }
            third_party.push(module.clone());
            let requirement = resolve_package(module);
            if !requirement.curated {
                warn!(module = %module, "no curated package mapping; assuming identical name");
                warnings.push(format!(
                    "no curated package mapping for '{module}'; using '{}'",
                    requirement.package
                ));
            }
            if manifest.declares(&requirement.package) {
                continue;
            }
            by_package
                .entry(normalize_package_name(&requirement.package))
                .or_insert_with(|| MissingPackage {
                    module: module.clone(),
                    package: requirement.package.clone(),
                    requirement: requirement.requirement_line(),
                    files: files.iter().cloned().collect(),
                });
        }
        let missing: Vec<MissingPackage> = by_package.into_values().collect();

        let mut added = Vec::new();
        let mut install_outcomes = Vec::new();
        if mode.fixes() && !missing.is_empty() {
            let lines: Vec<String> = missing.iter().map(|m| m.requirement.clone()).collect();
            let mut manifest = manifest;
            added = manifest.append(&lines, self.lock_timeout)?;
            if mode == SentinelMode::FixAndInstall {
                let to_install: Vec<(String, String)> = missing
                    .iter()
                    .filter(|m| added.contains(&m.requirement))
                    .map(|m| (m.package.clone(), m.requirement.clone()))
                    .collect();
                install_outcomes = install_each(self.installer.as_ref(), &to_install);
            }
        }

        let report = SentinelReport {
            mode,
            source_root: self.source_root.clone(),
            manifest: self.manifest.clone(),
            generated_at: Utc::now(),
            scanned_files: scan.files_scanned,
            third_party_modules: third_party,
            missing,
            added,
            install_outcomes,
            warnings,
        };
        info!(
            mode = ?report.mode,
            scanned_files = report.scanned_files,
            missing = report.missing.len(),
            added = report.added.len(),
            failed_installs = report.failed_installs().count(),
            "dependency sentinel finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingInstaller {
        installed: Mutex<Vec<String>>,
    }

    impl PackageInstaller for RecordingInstaller {
        fn install(&self, requirement: &str) -> std::result::Result<(), String> {
            self.installed.lock().push(requirement.to_owned());
            if requirement.starts_with("frobnicate") {
                Err("no matching distribution found".into())
            } else {
                Ok(())
            }
        }
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("app")).unwrap();
        fs::write(src.join("app/__init__.py"), "").unwrap();
        fs::write(
            src.join("app/main.py"),
            "import os\nimport yaml\nimport requests\nfrom app import util\nimport frobnicate\nimport corp_shared\n# import pandas\n",
        )
        .unwrap();
        fs::write(dir.path().join("requirements.txt"), "# runtime\nrequests>=2.0\n").unwrap();
        dir
    }

    #[test]
    fn check_reports_without_touching_manifest() {
        let dir = fixture();
        let manifest = dir.path().join("requirements.txt");
        let sentinel = DependencySentinel::new(dir.path().join("src"), &manifest)
            .with_internal_modules(["corp_shared".to_owned()]);
        let report = sentinel.check().unwrap();
        let packages: Vec<_> = report.missing.iter().map(|m| m.package.as_str()).collect();
        assert_eq!(packages, vec!["frobnicate", "PyYAML"]);
        assert!(report.added.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(
            fs::read_to_string(&manifest).unwrap(),
            "# runtime\nrequests>=2.0\n"
        );
    }

    #[test]
    fn install_mode_reports_each_package_independently() {
        let dir = fixture();
        let manifest = dir.path().join("requirements.txt");
        let installer = Arc::new(RecordingInstaller::default());
        let sentinel = DependencySentinel::new(dir.path().join("src"), &manifest)
            .with_internal_modules(["corp_shared".to_owned()])
            .with_installer(installer.clone());
        let report = sentinel.fix(true).unwrap();
        assert_eq!(report.added, vec!["frobnicate".to_owned(), "PyYAML>=6.0".to_owned()]);
        assert_eq!(installer.installed.lock().len(), 2);
        assert_eq!(report.failed_installs().count(), 1);

        let changes = report.manifest_changes();
        assert_eq!(changes.len(), 2);
        let yaml = changes.iter().find(|c| c.package == "PyYAML").unwrap();
        assert_eq!(yaml.module, "yaml");
        assert_eq!(yaml.installed, Some(true));
    }
}
