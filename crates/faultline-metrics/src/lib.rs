//! ---
//! fl_section: "03-persistence-logging"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Metrics collection and export utilities."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use tracing::debug;

/// Shared registry type used across crates.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Encode the registry in the Prometheus text format.
pub fn encode_text(registry: &Registry) -> Result<String> {
    let families = registry.gather();
    TextEncoder::new()
        .encode_to_string(&families)
        .context("failed to encode metrics")
}

/// Write the text exposition to `path`, suitable for a node-exporter textfile collector.
pub fn write_textfile(registry: &Registry, path: &Path) -> Result<()> {
    let body = encode_text(registry)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("prom.tmp");
    fs::write(&tmp, body).with_context(|| format!("unable to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("unable to move metrics into {}", path.display()))?;
    debug!(path = %path.display(), "metrics textfile written");
    Ok(())
}

/// Metrics published by the injector and the auto-healer.
#[derive(Clone)]
pub struct FaultlineMetrics {
    registry: SharedRegistry,
    scenarios_total: IntCounterVec,
    probe_failures_total: IntCounterVec,
    probe_latency_seconds: HistogramVec,
    runs_aborted_total: IntCounter,
    healing_attempts_total: IntCounterVec,
}

impl FaultlineMetrics {
    /// Register the metric families against the provided registry.
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let scenarios_total = IntCounterVec::new(
            Opts::new(
                "faultline_scenarios_total",
                "Fault scenarios executed, labelled by fault type and outcome",
            ),
            &["fault_type", "outcome"],
        )?;
        registry.register(Box::new(scenarios_total.clone()))?;

        let probe_failures_total = IntCounterVec::new(
            Opts::new(
                "faultline_probe_failures_total",
                "Health probes that failed while a scenario was active",
            ),
            &["scenario"],
        )?;
        registry.register(Box::new(probe_failures_total.clone()))?;

        let histogram_opts = HistogramOpts::new(
            "faultline_probe_latency_seconds",
            "Observed latency of successful health probes",
        )
        .buckets(prometheus::exponential_buckets(0.001, 2.0, 16)?);
        let probe_latency_seconds = HistogramVec::new(histogram_opts, &["scenario"])?;
        registry.register(Box::new(probe_latency_seconds.clone()))?;

        let runs_aborted_total = IntCounter::new(
            "faultline_runs_aborted_total",
            "Injection runs stopped early by abort conditions",
        )?;
        registry.register(Box::new(runs_aborted_total.clone()))?;

        let healing_attempts_total = IntCounterVec::new(
            Opts::new(
                "faultline_healing_attempts_total",
                "Healing attempts made by the auto-healer",
            ),
            &["category", "outcome"],
        )?;
        registry.register(Box::new(healing_attempts_total.clone()))?;

        Ok(Self {
            registry,
            scenarios_total,
            probe_failures_total,
            probe_latency_seconds,
            runs_aborted_total,
            healing_attempts_total,
        })
    }

    /// Expose the underlying shared registry for convenience.
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn record_scenario(&self, fault_type: &str, outcome: &str) {
        self.scenarios_total
            .with_label_values(&[fault_type, outcome])
            .inc();
    }

    pub fn record_probe(&self, scenario: &str, success: bool, latency: Duration) {
        if success {
            self.probe_latency_seconds
                .with_label_values(&[scenario])
                .observe(latency.as_secs_f64());
        } else {
            self.probe_failures_total.with_label_values(&[scenario]).inc();
        }
    }

    pub fn record_abort(&self) {
        self.runs_aborted_total.inc();
    }

    pub fn record_healing_attempt(&self, category: &str, healed: bool) {
        let outcome = if healed { "healed" } else { "not_healed" };
        self.healing_attempts_total
            .with_label_values(&[category, outcome])
            .inc();
    }
}

impl std::fmt::Debug for FaultlineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultlineMetrics").finish_non_exhaustive()
    }
}
