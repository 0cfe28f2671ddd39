// src/engine/drain.rs

//! Event drain: turns the notification queue into per-tick batches.

use std::time::Duration;

use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::job::InstanceEvent;

/// Upper bound on events taken in one burst, so a flood of notifications
/// cannot starve polling and rendering.
pub const DEFAULT_MAX_BURST: usize = 1024;

/// Consumer side of the notification queue.
///
/// Each call to [`EventDrain::next_batch`] waits at most `first_wait` for
/// the first event, then takes whatever else is already queued without
/// waiting. An empty batch is a normal outcome.
#[derive(Debug)]
pub struct EventDrain {
    rx: mpsc::UnboundedReceiver<InstanceEvent>,
    first_wait: Duration,
    max_burst: usize,
    closed: bool,
}

impl EventDrain {
    pub fn new(rx: mpsc::UnboundedReceiver<InstanceEvent>, first_wait: Duration) -> Self {
        Self {
            rx,
            first_wait,
            max_burst: DEFAULT_MAX_BURST,
            closed: false,
        }
    }

    pub fn with_max_burst(mut self, max_burst: usize) -> Self {
        self.max_burst = max_burst.max(1);
        self
    }

    /// True once every sender is gone; the drain then only paces the loop.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub async fn next_batch(&mut self) -> Vec<InstanceEvent> {
        if self.closed {
            sleep(self.first_wait).await;
            return Vec::new();
        }

        let mut batch = Vec::new();
        match timeout(self.first_wait, self.rx.recv()).await {
            Ok(Some(event)) => batch.push(event),
            Ok(None) => {
                self.mark_closed();
                return batch;
            }
            Err(_elapsed) => return batch,
        }

        while batch.len() < self.max_burst {
            match self.rx.try_recv() {
                Ok(event) => batch.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.mark_closed();
                    break;
                }
            }
        }

        debug!(events = batch.len(), "drained event burst");
        batch
    }

    fn mark_closed(&mut self) {
        if !self.closed {
            warn!("notification queue closed; continuing on polls only");
            self.closed = true;
        }
    }
}
