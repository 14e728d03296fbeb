//! ---
//! fl_section: "01-core-functionality"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Shared primitives and utilities for the faultline toolkit."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Cooperative cancellation wiring. A single [`CancellationToken`] is threaded
//! through every long-running operation; the process signal handler only cancels it.

use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use tokio_util::sync::CancellationToken;

/// Spawn a task that cancels `token` on CTRL+C or SIGTERM.
///
/// Cleanup itself happens in the operations observing the token, so the process
/// only exits after load generators are stopped and network state is rolled back.
pub fn install_shutdown_handler(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown_signal() => {
                warn!("termination signal received; cancelling active operations");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal as unix_signal, SignalKind};

    let mut sigterm = match unix_signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            warn!(error = %err, "unable to install SIGTERM handler; listening for ctrl_c only");
            let _ = signal::ctrl_c().await;
            info!("received ctrl_c");
            return;
        }
    };

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("received ctrl_c");
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM");
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("received ctrl_c");
}
