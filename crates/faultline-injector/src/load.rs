//! ---
//! fl_section: "02-fault-injection"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Fault injection engine and capability adapters."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Resource exhaustion: CPU, memory, and disk pressure.
//!
//! Two generators exist. The in-process generator drives worker threads inside
//! this binary; the external generator shells out to `stress-ng`. Both degrade
//! instead of failing when the host cannot satisfy the requested fan-out.

use std::fs::{self, File};
use std::hint::black_box;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use faultline_common::{FaultType, FaultlineError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const MIB: u64 = 1024 * 1024;
const PAGE: usize = 4096;
const DISK_CHUNK: usize = MIB as usize;
const HOLD_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Cpu,
    Memory,
    Disk,
}

impl ResourceKind {
    pub fn from_fault(fault: FaultType) -> Option<Self> {
        match fault {
            FaultType::Cpu => Some(ResourceKind::Cpu),
            FaultType::Memory => Some(ResourceKind::Memory),
            FaultType::Disk => Some(ResourceKind::Disk),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Memory => "memory",
            ResourceKind::Disk => "disk",
        }
    }
}

/// What a resource scenario asks the generator for.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub kind: ResourceKind,
    pub workers: usize,
    /// Memory held or bytes written per worker; ignored for CPU.
    pub bytes_per_worker: u64,
    /// Directory disk workers write into.
    pub scratch_dir: PathBuf,
    /// Upper bound handed to external tools so nothing outlives the scenario.
    pub max_duration: Duration,
}

/// Load currently applied to the host. Dropping it stops and joins every worker.
pub trait ActiveLoad: Send {
    /// Workers actually running.
    fn active_workers(&self) -> usize;

    /// Stop all workers, wait for them, and return degradation warnings.
    fn stop(&mut self) -> Vec<String>;
}

/// Applies resource pressure on request.
pub trait LoadGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    fn start(&self, request: &LoadRequest) -> Result<Box<dyn ActiveLoad>>;
}

/// Which generator `inject` uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadGeneratorPolicy {
    /// `stress-ng` when it is on `PATH`, in-process otherwise.
    #[default]
    Auto,
    InProcess,
    StressNg,
}

impl std::str::FromStr for LoadGeneratorPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "in-process" => Ok(Self::InProcess),
            "stress-ng" => Ok(Self::StressNg),
            other => Err(format!("unknown load generator '{}'", other)),
        }
    }
}

/// Resolve a policy into a concrete generator.
pub fn select_load_generator(policy: LoadGeneratorPolicy) -> Result<Arc<dyn LoadGenerator>> {
    match policy {
        LoadGeneratorPolicy::InProcess => Ok(Arc::new(InProcessLoadGenerator::new())),
        LoadGeneratorPolicy::StressNg => {
            let external = ExternalStressGenerator::discover().ok_or_else(|| {
                FaultlineError::configuration("stress-ng requested but not found on PATH")
            })?;
            Ok(Arc::new(external))
        }
        LoadGeneratorPolicy::Auto => Ok(match ExternalStressGenerator::discover() {
            Some(external) => Arc::new(external),
            None => Arc::new(InProcessLoadGenerator::new()),
        }),
    }
}

/// Worker threads inside this process.
#[derive(Debug, Clone)]
pub struct InProcessLoadGenerator {
    cpu_ceiling: usize,
}

impl InProcessLoadGenerator {
    pub fn new() -> Self {
        let cpu_ceiling = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self { cpu_ceiling }
    }

    /// Override the CPU worker ceiling (normally the host's parallelism).
    pub fn with_cpu_ceiling(mut self, ceiling: usize) -> Self {
        self.cpu_ceiling = ceiling.max(1);
        self
    }
}

impl Default for InProcessLoadGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadGenerator for InProcessLoadGenerator {
    fn name(&self) -> &'static str {
        "in-process"
    }

    fn start(&self, request: &LoadRequest) -> Result<Box<dyn ActiveLoad>> {
        let mut warnings = Vec::new();
        let mut workers = request.workers.max(1);
        if request.kind == ResourceKind::Cpu && workers > self.cpu_ceiling {
            warnings.push(format!(
                "requested {} cpu workers, host offers {}; running {}",
                workers, self.cpu_ceiling, self.cpu_ceiling
            ));
            workers = self.cpu_ceiling;
        }
        if request.kind == ResourceKind::Disk {
            fs::create_dir_all(&request.scratch_dir)?;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let stop = Arc::clone(&stop);
            let kind = request.kind;
            let bytes = request.bytes_per_worker;
            let file = request
                .scratch_dir
                .join(format!("faultline-disk-{}-{}.bin", std::process::id(), index));
            let spawned = thread::Builder::new()
                .name(format!("faultline-{}-{}", kind.as_str(), index))
                .spawn(move || match kind {
                    ResourceKind::Cpu => burn_cpu(&stop),
                    ResourceKind::Memory => hold_memory(&stop, bytes),
                    ResourceKind::Disk => churn_disk(&stop, &file, bytes),
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    warnings.push(format!(
                        "spawned {} of {} {} workers: {}",
                        handles.len(),
                        workers,
                        kind.as_str(),
                        err
                    ));
                    break;
                }
            }
        }
        for warning in &warnings {
            warn!(kind = request.kind.as_str(), "{}", warning);
        }
        debug!(
            kind = request.kind.as_str(),
            workers = handles.len(),
            "in-process load started"
        );
        Ok(Box::new(InProcessLoad {
            stop,
            handles,
            warnings,
        }))
    }
}

struct InProcessLoad {
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<Option<String>>>,
    warnings: Vec<String>,
}

impl ActiveLoad for InProcessLoad {
    fn active_workers(&self) -> usize {
        self.handles.len()
    }

    fn stop(&mut self) -> Vec<String> {
        self.stop.store(true, Ordering::SeqCst);
        let mut warnings = std::mem::take(&mut self.warnings);
        for handle in self.handles.drain(..) {
            match handle.join() {
                Ok(Some(warning)) => warnings.push(warning),
                Ok(None) => {}
                Err(_) => warnings.push("load worker panicked".to_owned()),
            }
        }
        warnings
    }
}

impl Drop for InProcessLoad {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            let _ = self.stop();
        }
    }
}

fn burn_cpu(stop: &AtomicBool) -> Option<String> {
    let mut acc: u64 = 0x9E37_79B9_7F4A_7C15;
    while !stop.load(Ordering::Relaxed) {
        for _ in 0..10_000 {
            acc = black_box(acc.rotate_left(5) ^ acc.wrapping_mul(31));
        }
    }
    black_box(acc);
    None
}

fn hold_memory(stop: &AtomicBool, bytes: u64) -> Option<String> {
    let requested = usize::try_from(bytes).unwrap_or(usize::MAX);
    let mut size = requested;
    let mut buffer: Vec<u8> = Vec::new();
    while size >= MIB as usize {
        if buffer.try_reserve_exact(size).is_ok() {
            break;
        }
        size /= 2;
    }
    let warning = if buffer.capacity() < requested {
        Some(format!(
            "memory worker reserved {} MiB of {} MiB requested",
            buffer.capacity() as u64 / MIB,
            bytes / MIB
        ))
    } else {
        None
    };
    // Touch every page so the allocation is resident, not just reserved.
    buffer.resize(buffer.capacity(), 0);
    for offset in (0..buffer.len()).step_by(PAGE) {
        buffer[offset] = 1;
    }
    while !stop.load(Ordering::Relaxed) {
        thread::sleep(HOLD_POLL);
    }
    black_box(&buffer);
    warning
}

fn churn_disk(stop: &AtomicBool, path: &Path, bytes: u64) -> Option<String> {
    let outcome = write_until_stopped(stop, path, bytes);
    let _ = fs::remove_file(path);
    outcome.err().map(|err| format!("disk worker degraded: {}", err))
}

fn write_until_stopped(stop: &AtomicBool, path: &Path, bytes: u64) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    let chunk = vec![0xA5u8; DISK_CHUNK];
    let target = bytes.max(DISK_CHUNK as u64);
    while !stop.load(Ordering::Relaxed) {
        let mut written = 0u64;
        file.seek(SeekFrom::Start(0))?;
        while written < target && !stop.load(Ordering::Relaxed) {
            file.write_all(&chunk)?;
            written += DISK_CHUNK as u64;
        }
        file.sync_data()?;
    }
    Ok(())
}

/// `stress-ng` child process per scenario.
#[derive(Debug, Clone)]
pub struct ExternalStressGenerator {
    program: PathBuf,
}

impl ExternalStressGenerator {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Locate `stress-ng` on `PATH`.
    pub fn discover() -> Option<Self> {
        find_on_path("stress-ng").map(Self::new)
    }

    fn arguments(request: &LoadRequest) -> Vec<String> {
        let workers = request.workers.max(1).to_string();
        let mib = (request.bytes_per_worker / MIB).max(1);
        let mut args = match request.kind {
            ResourceKind::Cpu => vec!["--cpu".to_owned(), workers],
            ResourceKind::Memory => vec![
                "--vm".to_owned(),
                workers,
                "--vm-bytes".to_owned(),
                format!("{}M", mib),
                "--vm-keep".to_owned(),
            ],
            ResourceKind::Disk => vec![
                "--hdd".to_owned(),
                workers,
                "--hdd-bytes".to_owned(),
                format!("{}M", mib),
                "--temp-path".to_owned(),
                request.scratch_dir.display().to_string(),
            ],
        };
        args.push("--timeout".to_owned());
        args.push(format!("{}s", request.max_duration.as_secs().max(1)));
        args.push("--quiet".to_owned());
        args
    }
}

impl LoadGenerator for ExternalStressGenerator {
    fn name(&self) -> &'static str {
        "stress-ng"
    }

    fn start(&self, request: &LoadRequest) -> Result<Box<dyn ActiveLoad>> {
        if request.kind == ResourceKind::Disk {
            fs::create_dir_all(&request.scratch_dir)?;
        }
        let child = Command::new(&self.program)
            .args(Self::arguments(request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                FaultlineError::injection(format!(
                    "failed to launch {}: {}",
                    self.program.display(),
                    err
                ))
            })?;
        debug!(pid = child.id(), kind = request.kind.as_str(), "stress-ng started");
        Ok(Box::new(ExternalLoad {
            child: Some(child),
            workers: request.workers.max(1),
        }))
    }
}

struct ExternalLoad {
    child: Option<Child>,
    workers: usize,
}

impl ActiveLoad for ExternalLoad {
    fn active_workers(&self) -> usize {
        if self.child.is_some() {
            self.workers
        } else {
            0
        }
    }

    fn stop(&mut self) -> Vec<String> {
        let Some(mut child) = self.child.take() else {
            return Vec::new();
        };
        let mut warnings = Vec::new();
        match child.try_wait() {
            Ok(Some(status)) if !status.success() => {
                warnings.push(format!("stress-ng exited early with {}", status));
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                if let Err(err) = child.kill() {
                    warnings.push(format!("unable to stop stress-ng: {}", err));
                }
            }
            Err(err) => warnings.push(format!("unable to poll stress-ng: {}", err)),
        }
        let _ = child.wait();
        warnings
    }
}

impl Drop for ExternalLoad {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

pub(crate) fn find_on_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
