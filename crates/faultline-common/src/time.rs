//! ---
//! fl_section: "01-core-functionality"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Shared primitives and utilities for the faultline toolkit."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::{FaultlineError, Result};

/// Sleep for `duration` unless `token` is cancelled first.
pub async fn sleep_or_cancel(duration: Duration, token: &CancellationToken) -> Result<()> {
    if duration.is_zero() {
        return if token.is_cancelled() {
            Err(FaultlineError::Interrupted)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = token.cancelled() => Err(FaultlineError::Interrupted),
    }
}

/// Seconds elapsed between two wall-clock instants, clamped at zero.
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let millis = (end - start).num_milliseconds();
    (millis.max(0) as f64) / 1000.0
}

/// Convert a duration into fractional milliseconds.
pub fn duration_to_millis_f64(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
