//! Graceful shutdown plumbing.
//!
//! A watch channel carries the shutdown flag from the signal handler to
//! the HTTP server, which then stops accepting connections and drains the
//! in-flight ones.

use tokio::sync::watch;
use tracing::info;

/// Receiving side of the shutdown flag; cloned into every component that
/// needs to stop on shutdown.
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Wait until shutdown is triggered.
    pub async fn wait(&mut self) {
        while !*self.receiver.borrow() {
            if self.receiver.changed().await.is_err() {
                // Sender dropped, treat as shutdown.
                break;
            }
        }
    }

    /// Non-blocking check of the shutdown flag.
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }
}

/// Sending side of the shutdown flag.
pub struct ShutdownController {
    sender: watch::Sender<bool>,
}

impl ShutdownController {
    /// Trigger shutdown.
    pub fn shutdown(&self) {
        let _ = self.sender.send(true);
        info!("shutdown signal sent");
    }
}

/// Create a connected controller/signal pair.
pub fn shutdown_channel() -> (ShutdownController, ShutdownSignal) {
    let (sender, receiver) = watch::channel(false);
    (ShutdownController { sender }, ShutdownSignal { receiver })
}

/// Wait for SIGTERM or SIGINT and return the signal's name.
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("received SIGTERM");
            Ok("SIGTERM")
        }
        _ = sigint.recv() => {
            info!("received SIGINT");
            Ok("SIGINT")
        }
    }
}

/// Wait for Ctrl+C (non-unix platforms).
#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    info!("received Ctrl+C");
    Ok("CTRL_C")
}
