// src/lib.rs

pub mod cli;
pub mod config;
pub mod driver;
pub mod errors;
pub mod executor;
pub mod fs;
pub mod logging;
pub mod protocol;
pub mod shutdown;
pub mod supervisor;
pub mod transport;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::CliArgs;
use crate::config::{AgentIdentity, load_settings};
use crate::driver::{DriverOptions, DriverSession, ExecutorDriver, UpdateSender};
use crate::executor::{Executor, ExecutorOptions};
use crate::fs::RealFileSystem;
use crate::supervisor::SupervisorClient;
use crate::transport::Connection;
use crate::types::ExecutorStatus;

/// How often the outer task checks whether the executor has finished.
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Why [`run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The executor reached `Finish`.
    Finished,
    /// A signal cancelled the executor's lifetime.
    Cancelled,
}

/// High-level entry point used by `main.rs`.
///
/// Resolves the identity, wires driver, executor and supervisor client
/// together, performs the first subscription and then waits for the executor
/// to finish or for a signal.
pub async fn run(args: CliArgs) -> Result<ExitReason> {
    let identity = AgentIdentity::from_env().context("resolving agent identity")?;

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(socket) = args.supervisor_socket {
        settings.supervisor_socket = socket;
    }

    let cancel = CancellationToken::new();
    shutdown::install_shutdown_handler(cancel.clone())?;

    let connection = Connection::new(&identity)?;
    let session = Arc::new(DriverSession::new(
        identity.clone(),
        connection,
        cancel.clone(),
    ));
    let supervisor = Arc::new(SupervisorClient::new(
        settings.supervisor_socket.clone(),
        settings.supervisor_timeout,
    ));
    let executor = Arc::new(Executor::new(
        supervisor,
        Arc::new(UpdateSender::new(Arc::clone(&session))),
        Arc::new(RealFileSystem),
        ExecutorOptions::new(&identity, &settings),
        cancel.clone(),
    ));
    shutdown::install_reload_handler(Arc::clone(&executor), cancel.clone())?;

    let driver = ExecutorDriver::new(
        session,
        Arc::clone(&executor),
        DriverOptions::new(&identity, &settings),
    );
    driver
        .start()
        .await
        .context("initial subscription to the agent failed")?;

    let reason = wait_for_exit(&executor, &cancel, EXIT_POLL_INTERVAL).await;
    cancel.cancel();
    info!(?reason, "executor exiting");
    Ok(reason)
}

/// Poll the executor every `poll` until it reaches `Finish` or `cancel`
/// fires.
pub async fn wait_for_exit(
    executor: &Executor,
    cancel: &CancellationToken,
    poll: Duration,
) -> ExitReason {
    let mut ticker = interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return ExitReason::Cancelled,
            _ = ticker.tick() => {
                if executor.status() == ExecutorStatus::Finish {
                    return ExitReason::Finished;
                }
            }
        }
    }
}
