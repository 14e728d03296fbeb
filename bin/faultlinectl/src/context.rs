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

use anyhow::{Context, Result};
use faultline_common::FaultlineConfig;
use faultline_history::{HistoryRecord, HistoryStore};
use faultline_metrics::{new_registry, write_textfile, FaultlineMetrics, SharedRegistry};
use serde::Serialize;

/// State shared by every subcommand.
pub struct CliContext {
    pub config: FaultlineConfig,
    pub config_source: Option<PathBuf>,
    registry: SharedRegistry,
    metrics: Option<FaultlineMetrics>,
    metrics_out: Option<PathBuf>,
}

impl CliContext {
    pub fn load(
        tool_config: Option<PathBuf>,
        history: Option<PathBuf>,
        metrics_out: Option<PathBuf>,
    ) -> Result<Self> {
        let mut candidates = Vec::new();
        if let Some(path) = tool_config {
            candidates.push(path);
        }
        candidates.push(PathBuf::from("faultline.toml"));
        let loaded = FaultlineConfig::load(&candidates).context("failed to load tool configuration")?;

        let mut config = loaded.config;
        if let Some(path) = history {
            config.history.path = path;
        }

        let registry = new_registry();
        let metrics = match &metrics_out {
            Some(_) => Some(FaultlineMetrics::new(registry.clone())?),
            None => None,
        };
        Ok(Self {
            config,
            config_source: loaded.source,
            registry,
            metrics,
            metrics_out,
        })
    }

    pub fn metrics(&self) -> Option<FaultlineMetrics> {
        self.metrics.clone()
    }

    pub fn history(&self) -> Result<HistoryStore> {
        let path = &self.config.history.path;
        HistoryStore::open(path)
            .with_context(|| format!("failed to open history store {}", path.display()))
    }

    /// Append to history; a failure is logged rather than failing the command.
    pub fn record(&self, history: &HistoryStore, records: Vec<HistoryRecord>) {
        if records.is_empty() {
            return;
        }
        if let Err(err) = history.append_all(records) {
            tracing::warn!(
                path = %history.path().display(),
                error = %err,
                "failed to append history records"
            );
        }
    }

    pub fn flush_metrics(&self) -> Result<()> {
        if let Some(path) = &self.metrics_out {
            write_textfile(&self.registry, path)?;
        }
        Ok(())
    }
}

/// Print a value to stdout as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
