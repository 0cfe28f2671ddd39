// src/engine/shutdown.rs

//! Explicit shutdown token for the live loop.
//!
//! The loop owns the connector; whoever wants it to stop (Ctrl-C handler,
//! a test, an embedding UI) holds a [`ShutdownHandle`] instead of reaching
//! into global state.

use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

pub fn shutdown_channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Trigger on the first Ctrl-C.
    pub fn trigger_on_ctrl_c(self) {
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("interrupt received; shutting down");
            self.trigger();
        });
    }
}

impl ShutdownSignal {
    /// Resolve once shutdown is triggered. Never resolves if every handle
    /// is dropped without triggering.
    pub async fn wait(&mut self) {
        let outcome = self.rx.wait_for(|triggered| *triggered).await.map(|_| ());
        if outcome.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
