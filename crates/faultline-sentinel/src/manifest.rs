//! ---
//! fl_section: "06-dependency-sentinel"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Dependency sentinel: import scanning and manifest reconciliation."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Plain-text requirements manifest: one package specification per line.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use faultline_common::AdvisoryLock;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::{Result, SentinelError};

static PACKAGE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9][A-Za-z0-9._-]*)").expect("invalid package name pattern")
});
static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-_.]+").expect("invalid separator pattern"));

/// Canonical package name used for comparisons (`Py_YAML` == `py-yaml`).
pub fn normalize_package_name(name: &str) -> String {
    SEPARATORS.replace_all(name.trim(), "-").to_lowercase()
}

/// Snapshot of a manifest's declared packages.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    path: PathBuf,
    declared: BTreeSet<String>,
}

impl Manifest {
    /// Read `path`; a missing manifest declares nothing.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(SentinelError::io(path, err)),
        };
        Ok(Self {
            path: path.to_path_buf(),
            declared: declared_packages(&text),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn declares(&self, package: &str) -> bool {
        self.declared.contains(&normalize_package_name(package))
    }

    pub fn declared(&self) -> impl Iterator<Item = &str> {
        self.declared.iter().map(String::as_str)
    }

    /// Append `lines` under the advisory lock, skipping packages declared by the time
    /// the lock is held. Existing lines and comments are left untouched.
    /// Returns the lines actually written.
    pub fn append(&mut self, lines: &[String], lock_timeout: Duration) -> Result<Vec<String>> {
        if lines.is_empty() {
            return Ok(Vec::new());
        }
        let _lock = AdvisoryLock::acquire(&self.path, lock_timeout).map_err(|err| {
            if err.kind() == io::ErrorKind::TimedOut {
                SentinelError::LockTimeout(self.path.clone())
            } else {
                SentinelError::io(&self.path, err)
            }
        })?;

        // Re-read inside the lock: a manual edit may have landed since `load`.
        let current = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(SentinelError::io(&self.path, err)),
        };
        self.declared = declared_packages(&current);

        let mut written = Vec::new();
        for line in lines {
            let Some(name) = package_name(line) else {
                continue;
            };
            if self.declared.insert(name) {
                written.push(line.clone());
            } else {
                debug!(manifest = %self.path.display(), requirement = %line, "already declared");
            }
        }
        if written.is_empty() {
            return Ok(written);
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| SentinelError::io(&self.path, err))?;
        let mut chunk = String::new();
        if !current.is_empty() && !current.ends_with('\n') {
            chunk.push('\n');
        }
        for line in &written {
            chunk.push_str(line);
            chunk.push('\n');
        }
        file.write_all(chunk.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|err| SentinelError::io(&self.path, err))?;
        info!(
            manifest = %self.path.display(),
            added = written.len(),
            "appended missing requirements"
        );
        Ok(written)
    }
}

fn package_name(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('-') {
        return None;
    }
    PACKAGE_NAME
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| normalize_package_name(m.as_str()))
}

fn declared_packages(text: &str) -> BTreeSet<String> {
    text.lines().filter_map(package_name).collect()
}
