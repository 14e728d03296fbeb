//! ---
//! fl_section: "02-fault-injection"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Fault injection engine and capability adapters."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Health probing of the target while faults are active.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use faultline_common::time::duration_to_millis_f64;
use faultline_common::{CancellationToken, FaultlineError, Result};
use faultline_metrics::FaultlineMetrics;
use tracing::debug;
use url::Url;

use crate::model::ProbeSample;

/// Single health check against the target.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> ProbeSample;
}

/// HTTP GET against `<base_url><path>`; any 2xx within the timeout is healthy.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
    url: Url,
}

impl HttpHealthProbe {
    pub fn new(base_url: &Url, path: &str, timeout: Duration) -> Result<Self> {
        let url = base_url.join(path).map_err(|err| {
            FaultlineError::configuration(format!(
                "cannot resolve health path '{}' against {}: {}",
                path, base_url, err
            ))
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FaultlineError::configuration(format!("http client: {}", err)))?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn probe(&self) -> ProbeSample {
        let at = Utc::now();
        let started = Instant::now();
        let response = self.client.get(self.url.clone()).send().await;
        let latency_ms = duration_to_millis_f64(started.elapsed());
        match response {
            Ok(resp) if resp.status().is_success() => {
                ProbeSample::ok(at, latency_ms, resp.status().as_u16())
            }
            Ok(resp) => {
                let status = resp.status().as_u16();
                let mut sample =
                    ProbeSample::failed(at, latency_ms, format!("unhealthy status {}", status));
                sample.status = Some(status);
                sample
            }
            Err(err) if err.is_timeout() => ProbeSample::failed(at, latency_ms, "probe timed out"),
            Err(err) => ProbeSample::failed(at, latency_ms, err.to_string()),
        }
    }
}

/// Polls a [`HealthProbe`] at a fixed interval, recording metrics per scenario.
#[derive(Clone)]
pub struct HealthPoller {
    probe: Arc<dyn HealthProbe>,
    interval: Duration,
    metrics: Option<FaultlineMetrics>,
}

impl HealthPoller {
    pub fn new(probe: Arc<dyn HealthProbe>, interval: Duration) -> Self {
        Self {
            probe,
            interval,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<FaultlineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    async fn sample(&self, label: &str, token: &CancellationToken) -> Result<ProbeSample> {
        let sample = tokio::select! {
            sample = self.probe.probe() => sample,
            _ = token.cancelled() => return Err(FaultlineError::Interrupted),
        };
        if let Some(metrics) = &self.metrics {
            let latency = Duration::from_secs_f64(sample.latency_ms.max(0.0) / 1000.0);
            metrics.record_probe(label, sample.success, latency);
        }
        debug!(
            scenario = label,
            success = sample.success,
            latency_ms = sample.latency_ms,
            "health probe"
        );
        Ok(sample)
    }

    /// Probe for at least `window` of wall-clock time.
    ///
    /// Samples gathered before a cancellation stay in `samples`.
    pub async fn observe(
        &self,
        label: &str,
        window: Duration,
        token: &CancellationToken,
        samples: &mut Vec<ProbeSample>,
    ) -> Result<()> {
        let started = Instant::now();
        let deadline = started + window;
        let mut tick = 0u32;
        while Instant::now() < deadline {
            samples.push(self.sample(label, token).await?);
            tick = tick.saturating_add(1);
            let next = (started + self.interval.saturating_mul(tick)).min(deadline);
            self.wait_until(next, token).await?;
        }
        Ok(())
    }

    /// Probe until `required` consecutive successes or until `window` elapses.
    ///
    /// Returns the index into `samples` of the first probe of the stabilizing run.
    pub async fn observe_until_stable(
        &self,
        label: &str,
        window: Duration,
        required: u32,
        token: &CancellationToken,
        samples: &mut Vec<ProbeSample>,
    ) -> Result<Option<usize>> {
        let started = Instant::now();
        let deadline = started + window;
        let required = required.max(1) as usize;
        let mut streak = 0usize;
        let mut tick = 0u32;
        loop {
            let sample = self.sample(label, token).await?;
            streak = if sample.success { streak + 1 } else { 0 };
            samples.push(sample);
            if streak >= required {
                return Ok(Some(samples.len() - streak));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tick = tick.saturating_add(1);
            let next = (started + self.interval.saturating_mul(tick)).min(deadline);
            self.wait_until(next, token).await?;
        }
    }

    async fn wait_until(&self, instant: Instant, token: &CancellationToken) -> Result<()> {
        let remaining = instant.saturating_duration_since(Instant::now());
        faultline_common::time::sleep_or_cancel(remaining, token).await
    }
}

impl std::fmt::Debug for HealthPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthPoller")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
