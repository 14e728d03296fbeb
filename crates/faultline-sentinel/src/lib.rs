//! ---
//! fl_section: "06-dependency-sentinel"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Dependency sentinel: import scanning and manifest reconciliation."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Dependency sentinel.
//!
//! Scans Python sources through a tree-sitter syntax tree (imports inside strings
//! and comments never count), maps third-party modules to installable packages,
//! and reconciles the result against a requirements manifest.

use std::path::PathBuf;

pub mod installer;
pub mod manifest;
pub mod mapping;
pub mod scan;
pub mod sentinel;
mod stdlib;

pub use installer::{InstallOutcome, PackageInstaller, PipInstaller};
pub use manifest::{normalize_package_name, Manifest};
pub use mapping::{resolve_package, PackageRequirement};
pub use scan::{extract_imports, scan_tree, ScanReport};
pub use sentinel::{DependencySentinel, MissingPackage, SentinelMode, SentinelReport};
pub use stdlib::is_stdlib_module;

pub type Result<T> = std::result::Result<T, SentinelError>;

#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("python grammar could not be loaded: {0}")]
    Grammar(String),
    #[error("timed out waiting for manifest lock on {0}")]
    LockTimeout(PathBuf),
}

impl SentinelError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
