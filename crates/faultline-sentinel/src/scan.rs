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
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::{Result, SentinelError};

const SKIPPED_DIRS: &[&str] = &[
    "__pycache__",
    "node_modules",
    "site-packages",
    "venv",
    "env",
    "build",
    "dist",
    "target",
];

/// Import scan of a source tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub files_scanned: usize,
    /// Top-level imported module → files importing it.
    pub modules: BTreeMap<String, BTreeSet<PathBuf>>,
    /// Top-level names defined by the tree itself (modules and packages).
    pub local_modules: BTreeSet<String>,
    pub warnings: Vec<String>,
}

fn python_parser() -> Result<tree_sitter::Parser> {
    let language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&language)
        .map_err(|err| SentinelError::Grammar(err.to_string()))?;
    Ok(parser)
}

/// Top-level module names imported by `source`. Relative imports are first-party and skipped.
pub fn extract_imports(source: &str) -> Result<BTreeSet<String>> {
    let mut parser = python_parser()?;
    let mut modules = BTreeSet::new();
    if let Some(tree) = parser.parse(source, None) {
        collect_imports(tree.root_node(), source.as_bytes(), &mut modules);
    }
    Ok(modules)
}

fn collect_imports(node: tree_sitter::Node, source: &[u8], modules: &mut BTreeSet<String>) {
    match node.kind() {
        "import_statement" => {
            for i in 0..node.named_child_count() {
                let Some(child) = node.named_child(i) else {
                    continue;
                };
                let dotted = match child.kind() {
                    "aliased_import" => child.child_by_field_name("name"),
                    "dotted_name" => Some(child),
                    _ => None,
                };
                if let Some(name) = dotted.and_then(|n| n.utf8_text(source).ok()) {
                    insert_top_level(name, modules);
                }
            }
            return;
        }
        "import_from_statement" => {
            if let Some(module) = node.child_by_field_name("module_name") {
                if module.kind() == "dotted_name" {
                    if let Ok(name) = module.utf8_text(source) {
                        insert_top_level(name, modules);
                    }
                }
            }
            return;
        }
        _ => {}
    }
    for i in 0..node.named_child_count() {
        if let Some(child) = node.named_child(i) {
            collect_imports(child, source, modules);
        }
    }
}

fn insert_top_level(dotted: &str, modules: &mut BTreeSet<String>) {
    if let Some(top) = dotted.split('.').next().map(str::trim) {
        if !top.is_empty() {
            modules.insert(top.to_owned());
        }
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

/// Walk `root` and collect imports from every `.py` file.
pub fn scan_tree(root: &Path) -> Result<ScanReport> {
    let mut report = ScanReport::default();
    let mut parser = python_parser()?;

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable path");
                report.warnings.push(err.to_string());
                continue;
            }
        };
        let path = entry.path();
        if entry.depth() == 1 {
            record_local_module(path, &mut report.local_modules);
        }
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("py")
        {
            continue;
        }
        let source = fs::read_to_string(path).map_err(|err| SentinelError::io(path, err))?;
        let Some(tree) = parser.parse(&source, None) else {
            report
                .warnings
                .push(format!("{}: parser produced no tree", path.display()));
            continue;
        };
        if tree.root_node().has_error() {
            debug!(file = %path.display(), "syntax errors present; scanning recoverable imports");
        }
        let mut modules = BTreeSet::new();
        collect_imports(tree.root_node(), source.as_bytes(), &mut modules);
        let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        for module in modules {
            report
                .modules
                .entry(module)
                .or_default()
                .insert(relative.clone());
        }
        report.files_scanned += 1;
    }
    Ok(report)
}

fn record_local_module(path: &Path, locals: &mut BTreeSet<String>) {
    if path.is_dir() {
        if path.join("__init__.py").is_file() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                locals.insert(name.to_owned());
            }
        }
    } else if path.extension().and_then(|e| e.to_str()) == Some("py") {
        if let Some(stem) = path.file_stem().and_then(|n| n.to_str()) {
            locals.insert(stem.to_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_real_import_statements_count() {
        let source = r#"
import os, sys
import numpy as np
import xml.etree.ElementTree as ET
from yaml import safe_load
from . import sibling
from .pkg import thing
from google.protobuf import message

# import commented_out
text = "import in_a_string"
doc = """
from docstring_module import nothing
"""

def lazy():
    try:
        import requests
    except ImportError:
        pass
"#;
        let modules = extract_imports(source).unwrap();
        let names: Vec<_> = modules.iter().map(String::as_str).collect();
        assert_eq!(
            names,
            vec!["google", "numpy", "os", "requests", "sys", "xml", "yaml"]
        );
    }

    #[test]
    fn scan_records_files_and_local_modules() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("app")).unwrap();
        fs::create_dir_all(dir.path().join(".venv/lib")).unwrap();
        fs::write(dir.path().join("app/__init__.py"), "").unwrap();
        fs::write(dir.path().join("app/main.py"), "import flask\nimport helpers\n").unwrap();
        fs::write(dir.path().join("helpers.py"), "import app\nimport flask\n").unwrap();
        fs::write(dir.path().join(".venv/lib/ignored.py"), "import should_not_appear\n").unwrap();

        let report = scan_tree(dir.path()).unwrap();
        assert_eq!(report.files_scanned, 3);
        assert_eq!(report.modules["flask"].len(), 2);
        assert!(!report.modules.contains_key("should_not_appear"));
        assert!(report.local_modules.contains("app"));
        assert!(report.local_modules.contains("helpers"));
    }
}
