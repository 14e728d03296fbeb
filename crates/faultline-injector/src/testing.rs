//! ---
//! fl_section: "02-fault-injection"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Fault injection engine and capability adapters."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Side-effect-free capability implementations for tests and local rehearsals.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use faultline_common::{FaultlineError, Result};
use parking_lot::Mutex;

use crate::disruption::ProcessDisruptor;
use crate::load::{ActiveLoad, LoadGenerator, LoadRequest, ResourceKind};
use crate::model::ProbeSample;
use crate::probe::HealthProbe;

/// Replays a fixed script of probe outcomes, then repeats the fallback.
#[derive(Debug)]
pub struct ScriptedProbe {
    script: Mutex<VecDeque<(bool, f64)>>,
    fallback: (bool, f64),
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn always_healthy(latency_ms: f64) -> Self {
        Self::with_latencies(std::iter::empty(), (true, latency_ms))
    }

    /// Healthy probes at 10 ms unless the script says otherwise.
    pub fn from_script(script: impl IntoIterator<Item = bool>) -> Self {
        Self::with_latencies(script.into_iter().map(|ok| (ok, 10.0)), (true, 10.0))
    }

    pub fn with_latencies(
        script: impl IntoIterator<Item = (bool, f64)>,
        fallback: (bool, f64),
    ) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn probe(&self) -> ProbeSample {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (success, latency) = self.script.lock().pop_front().unwrap_or(self.fallback);
        if success {
            ProbeSample::ok(Utc::now(), latency, 200)
        } else {
            ProbeSample::failed(Utc::now(), latency, "scripted failure")
        }
    }
}

/// Probe driven by a shared health switch, flipped by [`SwitchDisruptor`].
#[derive(Debug, Clone)]
pub struct SwitchProbe {
    healthy: Arc<AtomicBool>,
    latency_ms: f64,
}

impl SwitchProbe {
    pub fn new(healthy: Arc<AtomicBool>, latency_ms: f64) -> Self {
        Self {
            healthy,
            latency_ms,
        }
    }
}

#[async_trait]
impl HealthProbe for SwitchProbe {
    async fn probe(&self) -> ProbeSample {
        if self.healthy.load(Ordering::SeqCst) {
            ProbeSample::ok(Utc::now(), self.latency_ms, 200)
        } else {
            ProbeSample::failed(Utc::now(), self.latency_ms, "connection refused")
        }
    }
}

/// Load generator that records requests instead of applying pressure.
#[derive(Debug, Default)]
pub struct RecordingLoadGenerator {
    requests: Mutex<Vec<LoadRequest>>,
    active: Arc<AtomicUsize>,
    fail_on: Option<ResourceKind>,
}

impl RecordingLoadGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to start loads of `kind`.
    pub fn failing_on(kind: ResourceKind) -> Self {
        Self {
            fail_on: Some(kind),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<LoadRequest> {
        self.requests.lock().clone()
    }

    /// Loads started and not yet stopped.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl LoadGenerator for RecordingLoadGenerator {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn start(&self, request: &LoadRequest) -> Result<Box<dyn ActiveLoad>> {
        if self.fail_on == Some(request.kind) {
            return Err(FaultlineError::injection(format!(
                "{} load refused",
                request.kind.as_str()
            )));
        }
        self.requests.lock().push(request.clone());
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordedLoad {
            workers: request.workers,
            active: Some(Arc::clone(&self.active)),
        }))
    }
}

struct RecordedLoad {
    workers: usize,
    active: Option<Arc<AtomicUsize>>,
}

impl ActiveLoad for RecordedLoad {
    fn active_workers(&self) -> usize {
        self.workers
    }

    fn stop(&mut self) -> Vec<String> {
        if let Some(active) = self.active.take() {
            active.fetch_sub(1, Ordering::SeqCst);
        }
        Vec::new()
    }
}

impl Drop for RecordedLoad {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Disruptor that flips a shared health switch instead of touching processes.
///
/// Signals and stop commands mark the service down; restart and start commands
/// bring it back. Every call is recorded.
#[derive(Debug, Clone)]
pub struct SwitchDisruptor {
    healthy: Arc<AtomicBool>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl SwitchDisruptor {
    pub fn new(healthy: Arc<AtomicBool>) -> Self {
        Self {
            healthy,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ProcessDisruptor for SwitchDisruptor {
    async fn signal(&self, pid: u32, signal: &str) -> Result<()> {
        self.calls.lock().push(format!("signal {} {}", signal, pid));
        self.healthy.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn run_command(&self, command: &str) -> Result<()> {
        self.calls.lock().push(command.to_owned());
        let up = command.contains("start");
        self.healthy.store(up, Ordering::SeqCst);
        Ok(())
    }
}
