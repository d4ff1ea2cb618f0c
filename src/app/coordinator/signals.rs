//! Process signals that stop the refresh coordinator
//!
//! `serve` runs until the process is interrupted or terminated. The first
//! signal received is turned into one broadcast on the shutdown channel that
//! the consumer, the dispatcher and every retry chain listen on.

use std::fmt;

use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Why the coordinator was asked to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C / SIGINT
    Interrupt,
    /// SIGTERM, as sent by service managers and container runtimes
    Terminate,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Interrupt => write!(f, "interrupt"),
            ShutdownReason::Terminate => write!(f, "terminate"),
        }
    }
}

/// Forwards the first shutdown signal to a broadcast channel
pub struct SignalHandler {
    shutdown_tx: broadcast::Sender<()>,
}

impl SignalHandler {
    pub fn new(shutdown_tx: broadcast::Sender<()>) -> Self {
        Self { shutdown_tx }
    }

    /// Spawn the listener task
    ///
    /// The task resolves with the signal that fired, after broadcasting it.
    pub fn setup(&self) -> JoinHandle<ShutdownReason> {
        let shutdown_tx = self.shutdown_tx.clone();

        tokio::spawn(async move {
            let reason = next_shutdown_signal().await;
            info!("Received {} signal, stopping refresh", reason);
            notify(&shutdown_tx);
            reason
        })
    }
}

/// Wait for whichever shutdown signal arrives first
///
/// A signal source that cannot be installed is logged and never fires.
pub async fn next_shutdown_signal() -> ShutdownReason {
    tokio::select! {
        _ = interrupted() => ShutdownReason::Interrupt,
        _ = terminated() => ShutdownReason::Terminate,
    }
}

async fn interrupted() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminated() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Cannot listen for SIGTERM: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminated() {
    std::future::pending::<()>().await;
}

/// Broadcast shutdown; having no listeners left is fine
fn notify(shutdown_tx: &broadcast::Sender<()>) {
    if shutdown_tx.send(()).is_err() {
        info!("No refresh tasks were listening for shutdown");
    }
}

/// Shutdown channel shared by the coordinator's tasks
pub fn create_shutdown_channel() -> (broadcast::Sender<()>, broadcast::Receiver<()>) {
    broadcast::channel(1)
}

/// Resolve once shutdown is broadcast or the last sender is dropped
pub async fn wait_for_shutdown_signal(mut shutdown_rx: broadcast::Receiver<()>) {
    let _ = shutdown_rx.recv().await;
}
