//! ---
//! fl_section: "05-self-healing"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Auto-healer: failure classification, remediation, bounded retries."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::time::Duration;

/// Exponential backoff: `base * 2^n`, each step capped at `step_cap`, the sum capped
/// at `total_cap` (the final step is truncated to fit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffSchedule {
    pub base: Duration,
    pub step_cap: Duration,
    pub total_cap: Duration,
}

impl BackoffSchedule {
    pub fn new(base: Duration, step_cap: Duration, total_cap: Duration) -> Self {
        Self {
            base,
            step_cap,
            total_cap,
        }
    }

    /// Delay of the `step`-th wait (0-indexed), ignoring the total cap.
    pub fn step(&self, step: u32) -> Duration {
        let exponent = step.min(16);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.step_cap)
            .min(self.step_cap)
    }

    pub fn delays(&self) -> BackoffDelays {
        BackoffDelays {
            schedule: *self,
            step: 0,
            elapsed: Duration::ZERO,
        }
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(2),
            Duration::from_secs(10),
            Duration::from_secs(60),
        )
    }
}

#[derive(Debug, Clone)]
pub struct BackoffDelays {
    schedule: BackoffSchedule,
    step: u32,
    elapsed: Duration,
}

impl Iterator for BackoffDelays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let remaining = self.schedule.total_cap.saturating_sub(self.elapsed);
        if remaining.is_zero() || self.schedule.base.is_zero() {
            return None;
        }
        let delay = self.schedule.step(self.step).min(remaining);
        self.step = self.step.saturating_add(1);
        self.elapsed += delay;
        Some(delay)
    }
}
