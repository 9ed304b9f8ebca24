// src/shutdown.rs

//! Signal handling.

use std::sync::Arc;

use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::errors::Result;
use crate::executor::Executor;

/// Cancel `token` on SIGTERM or SIGINT.
pub fn install_shutdown_handler(token: CancellationToken) -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, stopping executor"),
            _ = sigint.recv() => info!("received SIGINT, stopping executor"),
            _ = token.cancelled() => return,
        }
        token.cancel();
    });

    Ok(())
}

/// Ask the supervisor to reload every task on SIGHUP, until `token` is
/// cancelled.
pub fn install_reload_handler(executor: Arc<Executor>, token: CancellationToken) -> Result<()> {
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                received = sighup.recv() => {
                    if received.is_none() {
                        warn!("SIGHUP stream closed; reload on signal disabled");
                        return;
                    }
                }
            }

            info!("received SIGHUP, reloading tasks");
            if let Err(err) = executor.reload_tasks().await {
                error!(error = %err, "task reload failed");
            }
        }
    });

    Ok(())
}
