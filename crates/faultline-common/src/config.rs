//! ---
//! fl_section: "01-core-functionality"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Shared primitives and utilities for the faultline toolkit."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds, DurationSecondsWithFrac};
use tracing::debug;

use crate::error::{FaultlineError, Result};
use crate::logging::LogFormat;

fn default_probe_path() -> String {
    "/health".to_owned()
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_probe_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_baseline() -> Duration {
    Duration::from_secs(5)
}

fn default_recovery_window() -> Duration {
    Duration::from_secs(10)
}

fn default_stabilization_successes() -> u32 {
    3
}

fn default_cpu_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

fn default_memory_workers() -> usize {
    4
}

fn default_disk_workers() -> usize {
    2
}

fn default_chunk_mb() -> u64 {
    256
}

fn default_consecutive_failures() -> Option<u32> {
    Some(3)
}

fn default_min_probes_for_error_rate() -> u32 {
    5
}

fn default_interface() -> String {
    "eth0".to_owned()
}

/// Fault class applied by a scenario.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FaultType {
    Cpu,
    Memory,
    Disk,
    NetworkDelay,
    NetworkLoss,
    ProcessCrash,
    ServiceDowntime,
}

/// Coarse grouping of fault types by the mechanism that applies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultFamily {
    ResourceExhaustion,
    NetworkDegradation,
    ProcessDisruption,
}

impl FaultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultType::Cpu => "cpu",
            FaultType::Memory => "memory",
            FaultType::Disk => "disk",
            FaultType::NetworkDelay => "network_delay",
            FaultType::NetworkLoss => "network_loss",
            FaultType::ProcessCrash => "process_crash",
            FaultType::ServiceDowntime => "service_downtime",
        }
    }

    pub fn family(&self) -> FaultFamily {
        match self {
            FaultType::Cpu | FaultType::Memory | FaultType::Disk => FaultFamily::ResourceExhaustion,
            FaultType::NetworkDelay | FaultType::NetworkLoss => FaultFamily::NetworkDegradation,
            FaultType::ProcessCrash | FaultType::ServiceDowntime => {
                FaultFamily::ProcessDisruption
            }
        }
    }
}

impl fmt::Display for FaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scenario intensity controlling worker fan-out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    #[default]
    Light,
    Medium,
    Heavy,
}

impl Intensity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intensity::Light => "light",
            Intensity::Medium => "medium",
            Intensity::Heavy => "heavy",
        }
    }

    /// Worker count for this intensity given the configured maximum.
    ///
    /// Light is one unit, medium the midpoint, heavy the configured maximum.
    pub fn workers(&self, max: usize) -> usize {
        let max = max.max(1);
        match self {
            Intensity::Light => 1,
            Intensity::Medium => max.div_ceil(2),
            Intensity::Heavy => max,
        }
    }
}

/// Type-specific scenario parameters. Unused fields are ignored per fault type.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScenarioParameters {
    /// Explicit worker count overriding the intensity mapping.
    #[serde(default)]
    pub workers: Option<usize>,
    /// Memory allocated by each memory worker.
    #[serde(default)]
    pub memory_mb_per_worker: Option<u64>,
    /// Bytes written by each disk worker.
    #[serde(default)]
    pub disk_mb_per_worker: Option<u64>,
    /// Added latency for `network_delay`.
    #[serde(default)]
    pub delay_ms: Option<u64>,
    /// Latency jitter for `network_delay`.
    #[serde(default)]
    pub jitter_ms: Option<u64>,
    /// Packet loss for `network_loss`.
    #[serde(default)]
    pub loss_percent: Option<f64>,
    /// Interface override for network scenarios.
    #[serde(default)]
    pub interface: Option<String>,
    /// Process id targeted by `process_crash` when no target handle is supplied.
    #[serde(default)]
    pub pid: Option<u32>,
    /// Signal name delivered by `process_crash` (default `TERM`).
    #[serde(default)]
    pub signal: Option<String>,
    /// Command executed after a crash to bring the process back.
    #[serde(default)]
    pub restart_command: Option<String>,
    /// Command stopping the service for `service_downtime`.
    #[serde(default)]
    pub stop_command: Option<String>,
    /// Command starting the service after `service_downtime`.
    #[serde(default)]
    pub start_command: Option<String>,
}

/// One discrete fault-injection configuration.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScenarioSpec {
    pub name: String,
    pub fault_type: FaultType,
    #[serde(default)]
    pub intensity: Intensity,
    #[serde(rename = "duration_seconds")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub duration: Duration,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: ScenarioParameters,
}

impl ScenarioSpec {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(FaultlineError::configuration("scenario name must not be empty"));
        }
        if self.duration.is_zero() {
            return Err(FaultlineError::configuration(format!(
                "scenario '{}' must declare a non-zero duration_seconds",
                self.name
            )));
        }
        match self.fault_type {
            FaultType::NetworkLoss => {
                let loss = self.parameters.loss_percent.unwrap_or(10.0);
                if !(loss > 0.0 && loss <= 100.0) {
                    return Err(FaultlineError::configuration(format!(
                        "scenario '{}' loss_percent must be within (0, 100], got {}",
                        self.name, loss
                    )));
                }
            }
            FaultType::ServiceDowntime => {
                if self.parameters.stop_command.is_none() || self.parameters.start_command.is_none()
                {
                    return Err(FaultlineError::configuration(format!(
                        "scenario '{}' requires stop_command and start_command",
                        self.name
                    )));
                }
            }
            _ => {}
        }
        if self.parameters.workers == Some(0) {
            return Err(FaultlineError::configuration(format!(
                "scenario '{}' workers override must be at least 1",
                self.name
            )));
        }
        Ok(())
    }
}

/// Reliability thresholds every validation is compared against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SloThresholds {
    pub mttr_seconds: f64,
    pub max_error_rate_percent: f64,
    pub min_availability_percent: f64,
    pub max_latency_degradation_ms: f64,
    pub max_recovery_seconds: f64,
}

impl Default for SloThresholds {
    fn default() -> Self {
        Self {
            mttr_seconds: 60.0,
            max_error_rate_percent: 5.0,
            min_availability_percent: 95.0,
            max_latency_degradation_ms: 500.0,
            max_recovery_seconds: 60.0,
        }
    }
}

/// Thresholds loaded for validation, with the stabilization rule of the
/// scenario document they came from.
#[derive(Debug, Clone)]
pub struct ThresholdsDocument {
    pub slo: SloThresholds,
    /// `None` when the thresholds came from a standalone document.
    pub stabilization_successes: Option<u32>,
}

impl ThresholdsDocument {
    /// Load a standalone thresholds document, or the `slo` table of a scenario document.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut value = read_document_value(path)?;
        let (slo, stabilization_successes) = match value.get_mut("slo").map(serde_json::Value::take) {
            Some(slo) => {
                let successes = match value.get_mut("stabilization_successes") {
                    Some(raw) => deserialize_value::<u32>(raw.take(), path)?,
                    None => default_stabilization_successes(),
                };
                if successes == 0 {
                    return Err(FaultlineError::configuration(
                        "stabilization_successes must be at least 1",
                    ));
                }
                (slo, Some(successes))
            }
            None => (value, None),
        };
        let slo: SloThresholds = deserialize_value(slo, path)?;
        slo.validate()?;
        Ok(Self {
            slo,
            stabilization_successes,
        })
    }
}

impl SloThresholds {
    /// Load thresholds from a standalone document or from the `slo` table of a scenario document.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        ThresholdsDocument::from_path(path).map(|document| document.slo)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("max_error_rate_percent", self.max_error_rate_percent),
            ("min_availability_percent", self.min_availability_percent),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(FaultlineError::configuration(format!(
                    "slo.{} must be within [0, 100], got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [
            ("mttr_seconds", self.mttr_seconds),
            ("max_latency_degradation_ms", self.max_latency_degradation_ms),
            ("max_recovery_seconds", self.max_recovery_seconds),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(FaultlineError::configuration(format!(
                    "slo.{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Run-level abort triggers. Exceeding any of them skips the remaining scenarios.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AbortConditions {
    /// Abort once this many scenarios fail back to back.
    #[serde(default = "default_consecutive_failures")]
    pub max_consecutive_failures: Option<u32>,
    /// Abort once the cumulative probe error rate exceeds this percentage.
    #[serde(default)]
    pub error_rate_spike_percent: Option<f64>,
    /// Probe count required before the error-rate trigger is evaluated.
    #[serde(default = "default_min_probes_for_error_rate")]
    pub min_probes_for_error_rate: u32,
}

impl Default for AbortConditions {
    fn default() -> Self {
        Self {
            max_consecutive_failures: default_consecutive_failures(),
            error_rate_spike_percent: None,
            min_probes_for_error_rate: default_min_probes_for_error_rate(),
        }
    }
}

/// Health probe settings.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_path")]
    pub path: String,
    #[serde(default = "default_probe_timeout", rename = "timeout_seconds")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub timeout: Duration,
    #[serde(default = "default_probe_interval", rename = "interval_seconds")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub interval: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            path: default_probe_path(),
            timeout: default_probe_timeout(),
            interval: default_probe_interval(),
        }
    }
}

/// Upper bounds on resource-exhaustion worker fan-out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WorkerLimits {
    #[serde(default = "default_cpu_workers")]
    pub cpu: usize,
    #[serde(default = "default_memory_workers")]
    pub memory: usize,
    #[serde(default = "default_disk_workers")]
    pub disk: usize,
    #[serde(default = "default_chunk_mb")]
    pub memory_mb_per_worker: u64,
    #[serde(default = "default_chunk_mb")]
    pub disk_mb_per_worker: u64,
}

impl Default for WorkerLimits {
    fn default() -> Self {
        Self {
            cpu: default_cpu_workers(),
            memory: default_memory_workers(),
            disk: default_disk_workers(),
            memory_mb_per_worker: default_chunk_mb(),
            disk_mb_per_worker: default_chunk_mb(),
        }
    }
}

/// Scenario configuration document consumed by `inject` and `validate`.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScenarioDocument {
    #[serde(default)]
    pub scenarios: Vec<ScenarioSpec>,
    #[serde(default)]
    pub slo: SloThresholds,
    #[serde(default)]
    pub abort_conditions: AbortConditions,
    /// Named scenario groups (e.g. smoke, standard, stress) for selective execution.
    #[serde(default)]
    pub groups: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub workers: WorkerLimits,
    #[serde(default = "default_baseline", rename = "baseline_seconds")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub baseline: Duration,
    #[serde(default = "default_recovery_window", rename = "recovery_window_seconds")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub recovery_window: Duration,
    /// Consecutive successful probes that mark a recovered service.
    #[serde(default = "default_stabilization_successes")]
    pub stabilization_successes: u32,
    /// Interface impaired by network scenarios unless overridden per scenario.
    #[serde(default = "default_interface")]
    pub network_interface: String,
}

impl Default for ScenarioDocument {
    fn default() -> Self {
        Self {
            scenarios: Vec::new(),
            slo: SloThresholds::default(),
            abort_conditions: AbortConditions::default(),
            groups: IndexMap::new(),
            probe: ProbeConfig::default(),
            workers: WorkerLimits::default(),
            baseline: default_baseline(),
            recovery_window: default_recovery_window(),
            stabilization_successes: default_stabilization_successes(),
            network_interface: default_interface(),
        }
    }
}

impl ScenarioDocument {
    /// Load and validate a scenario document. `.yaml`/`.yml`/`.json` select the format, TOML otherwise.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(config_path = %path.display(), "loading scenario document");
        let value = read_document_value(path)?;
        let document: ScenarioDocument = deserialize_value(value, path)?;
        document.validate()?;
        Ok(document)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for scenario in &self.scenarios {
            scenario.validate()?;
            if !names.insert(scenario.name.as_str()) {
                return Err(FaultlineError::configuration(format!(
                    "duplicate scenario name '{}'",
                    scenario.name
                )));
            }
        }
        for (group, members) in &self.groups {
            if let Some(unknown) = members.iter().find(|m| !names.contains(m.as_str())) {
                return Err(FaultlineError::configuration(format!(
                    "group '{}' references unknown scenario '{}'",
                    group, unknown
                )));
            }
        }
        if self.stabilization_successes == 0 {
            return Err(FaultlineError::configuration(
                "stabilization_successes must be at least 1",
            ));
        }
        if self.probe.interval.is_zero() {
            return Err(FaultlineError::configuration(
                "probe.interval_seconds must be greater than zero",
            ));
        }
        self.slo.validate()
    }

    /// Select scenarios by group and/or name, preserving configured order.
    pub fn select(&self, scenario: Option<&str>, group: Option<&str>) -> Result<Vec<ScenarioSpec>> {
        let group_members = match group {
            Some(group) => Some(self.groups.get(group).ok_or_else(|| {
                FaultlineError::configuration(format!("unknown scenario group '{}'", group))
            })?),
            None => None,
        };
        if let Some(name) = scenario {
            if !self.scenarios.iter().any(|s| s.name == name) {
                return Err(FaultlineError::configuration(format!(
                    "unknown scenario '{}'",
                    name
                )));
            }
        }
        Ok(self
            .scenarios
            .iter()
            .filter(|s| group_members.map_or(true, |members| members.contains(&s.name)))
            .filter(|s| scenario.map_or(true, |name| s.name == name))
            .cloned()
            .collect())
    }
}

impl std::str::FromStr for ScenarioDocument {
    type Err = FaultlineError;

    fn from_str(input: &str) -> Result<Self> {
        let value: serde_json::Value =
            toml::from_str(input).map_err(|err| FaultlineError::configuration(err))?;
        let document: ScenarioDocument = deserialize_value(value, Path::new("<inline>"))?;
        document.validate()?;
        Ok(document)
    }
}

/// Read a TOML, YAML, or JSON document into a generic value tree.
pub fn read_document_value(path: &Path) -> Result<serde_json::Value> {
    let contents = fs::read_to_string(path).map_err(|err| {
        FaultlineError::configuration(format!("unable to read {}: {}", path.display(), err))
    })?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let parsed = match extension.as_deref() {
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str::<serde_json::Value>(&contents).map_err(|e| e.to_string())
        }
        Some("json") => serde_json::from_str::<serde_json::Value>(&contents).map_err(|e| e.to_string()),
        _ => toml::from_str::<serde_json::Value>(&contents).map_err(|e| e.to_string()),
    };
    parsed.map_err(|err| {
        FaultlineError::configuration(format!("failed to parse {}: {}", path.display(), err))
    })
}

fn deserialize_value<T: DeserializeOwned>(value: serde_json::Value, path: &Path) -> Result<T> {
    serde_path_to_error::deserialize(value).map_err(|err| {
        FaultlineError::configuration(format!(
            "invalid document {} at `{}`: {}",
            path.display(),
            err.path(),
            err.inner()
        ))
    })
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/faultline/logs")
}

fn default_history_path() -> PathBuf {
    PathBuf::from("target/faultline/history.jsonl")
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_backoff_base() -> Duration {
    Duration::from_secs(2)
}

fn default_backoff_step_cap() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_total_cap() -> Duration {
    Duration::from_secs(60)
}

fn default_stabilization_wait() -> Duration {
    Duration::from_secs(5)
}

fn default_source_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_manifest() -> PathBuf {
    PathBuf::from("requirements.txt")
}

fn default_installer_program() -> String {
    "python3".to_owned()
}

fn default_installer_args() -> Vec<String> {
    vec!["-m".into(), "pip".into(), "install".into()]
}

fn default_lock_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Tool-level configuration (`faultline.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FaultlineConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub healer: HealerSettings,
    #[serde(default)]
    pub sentinel: SentinelSettings,
}

/// Metadata describing where a [`FaultlineConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedFaultlineConfig {
    pub config: FaultlineConfig,
    pub source: Option<PathBuf>,
}

impl FaultlineConfig {
    pub const ENV_CONFIG_PATH: &'static str = "FAULTLINE_CONFIG";

    /// Load configuration, respecting the `FAULTLINE_CONFIG` override. Missing files yield defaults.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedFaultlineConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedFaultlineConfig {
                    config,
                    source: Some(path),
                });
            }
        }
        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedFaultlineConfig {
                    config,
                    source: Some(path.to_path_buf()),
                });
            }
        }
        Ok(LoadedFaultlineConfig {
            config: FaultlineConfig::default(),
            source: None,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading faultline configuration");
        let value = read_document_value(path)?;
        deserialize_value(value, path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: LogFormat::default(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
        }
    }
}

/// Auto-healer defaults; CLI flags override the retry count and delay.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealerSettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay", rename = "retry_delay_seconds")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub retry_delay: Duration,
    #[serde(default = "default_backoff_base", rename = "backoff_base_seconds")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub backoff_base: Duration,
    #[serde(default = "default_backoff_step_cap", rename = "backoff_step_cap_seconds")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub backoff_step_cap: Duration,
    #[serde(default = "default_backoff_total_cap", rename = "backoff_total_cap_seconds")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub backoff_total_cap: Duration,
    #[serde(default = "default_stabilization_wait", rename = "stabilization_wait_seconds")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub stabilization_wait: Duration,
    /// Health endpoint re-probed between health_check backoff waits.
    #[serde(default)]
    pub health_url: Option<String>,
    #[serde(default = "default_probe_timeout", rename = "health_timeout_seconds")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub health_timeout: Duration,
}

impl Default for HealerSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            backoff_base: default_backoff_base(),
            backoff_step_cap: default_backoff_step_cap(),
            backoff_total_cap: default_backoff_total_cap(),
            stabilization_wait: default_stabilization_wait(),
            health_url: None,
            health_timeout: default_probe_timeout(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelSettings {
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
    /// First-party modules that never map to installable packages.
    #[serde(default)]
    pub internal_modules: Vec<String>,
    #[serde(default = "default_installer_program")]
    pub installer_program: String,
    #[serde(default = "default_installer_args")]
    pub installer_args: Vec<String>,
    #[serde(default = "default_lock_timeout", rename = "lock_timeout_seconds")]
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub lock_timeout: Duration,
}

impl Default for SentinelSettings {
    fn default() -> Self {
        Self {
            source_root: default_source_root(),
            manifest: default_manifest(),
            internal_modules: Vec::new(),
            installer_program: default_installer_program(),
            installer_args: default_installer_args(),
            lock_timeout: default_lock_timeout(),
        }
    }
}
