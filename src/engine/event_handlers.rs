// src/engine/event_handlers.rs

//! Handling logic for the inputs of one tick: event batches, poll results
//! and discovery fetches.

use std::time::Instant;

use tracing::{debug, warn};

use crate::engine::store::{EventEffect, ReconciliationStore};
use crate::errors::{Result, TaroError};
use crate::job::{InstanceEvent, InstanceId, JobInstance, JobRun};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Ask the environment whether this instance exists and, if so, seed it.
    Discover(InstanceId),
}

/// Result of handling one batch of events.
#[derive(Debug, Clone, Default)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the store changed and the view is worth repainting.
    pub changed: bool,
}

/// Apply a batch of events in delivery order.
///
/// Discovery requests are de-duplicated: several events for the same unseen
/// run produce one fetch.
pub fn handle_event_batch(
    store: &mut ReconciliationStore,
    events: Vec<InstanceEvent>,
    now: Instant,
) -> CoreStep {
    let mut step = CoreStep::default();

    for event in events {
        match store.apply_event(&event, now) {
            EventEffect::Dropped => {}
            EventEffect::Ended | EventEffect::Updated => step.changed = true,
            EventEffect::Undiscovered(id) => {
                let command = CoreCommand::Discover(id);
                if !step.commands.contains(&command) {
                    step.commands.push(command);
                }
            }
        }
    }

    step
}

/// Merge a poll result.
///
/// A transport failure is logged and otherwise ignored: it is equivalent to
/// a poll that found nothing new and marks nothing missing. Returns the
/// error message for display. Fatal errors propagate.
pub fn handle_poll_result(
    store: &mut ReconciliationStore,
    result: Result<Vec<JobRun>>,
    now: Instant,
) -> Result<Option<String>> {
    match result {
        Ok(runs) => {
            debug!(runs = runs.len(), "poll succeeded");
            store.apply_poll(runs, now);
            Ok(None)
        }
        Err(e) => recoverable(e, "poll failed; keeping previous state").map(Some),
    }
}

/// Merge the outcome of a discovery fetch for `id`.
pub fn handle_discovery(
    store: &mut ReconciliationStore,
    id: &InstanceId,
    result: Result<Option<JobInstance>>,
) -> Result<bool> {
    match result {
        Ok(Some(instance)) => {
            let seeded = store.discover(instance.into_run());
            debug!(instance = %id, seeded, "discovery fetch completed");
            Ok(seeded)
        }
        Ok(None) => {
            debug!(instance = %id, "event referenced a run the environment no longer has");
            Ok(false)
        }
        Err(e) => recoverable(e, "discovery fetch failed").map(|_| false),
    }
}

fn recoverable(e: TaroError, what: &str) -> Result<String> {
    if e.is_fatal() {
        return Err(e);
    }
    warn!(error = %e, "{what}");
    Ok(e.to_string())
}
