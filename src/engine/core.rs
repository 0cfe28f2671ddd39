// src/engine/core.rs

//! Pure core of the live view.
//!
//! [`LiveCore`] owns the reconciliation store and the poll schedule. It
//! consumes event batches, poll results and discovery results, and produces:
//! - an updated store
//! - a list of commands describing what the IO shell should fetch next
//!
//! The async shell (`engine::runtime::LiveRuntime`) is responsible for:
//! - draining the notification queue
//! - calling the environment (polls, discovery fetches)
//! - handing frames to the render sink
//! - shutdown
//!
//! Nothing here touches Tokio, channels or a clock; every entry point takes
//! the current instant from the caller.

use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::engine::event_handlers::{
    handle_discovery, handle_event_batch, handle_poll_result, CoreStep,
};
use crate::engine::poll::PollSchedule;
use crate::engine::render::{LiveRow, LiveView};
use crate::engine::store::{ReconciliationStore, SweepReport};
use crate::errors::Result;
use crate::job::{InstanceEvent, InstanceId, JobInstance, JobRun};
use crate::types::PollStrategy;

#[derive(Debug)]
pub struct LiveCore {
    env_id: String,
    store: ReconciliationStore,
    schedule: PollSchedule,
    /// Message of the last failed poll, cleared by the next success.
    notice: Option<String>,
}

impl LiveCore {
    pub fn new(env_id: impl Into<String>, store: ReconciliationStore, poll: PollStrategy) -> Self {
        Self {
            env_id: env_id.into(),
            store,
            schedule: PollSchedule::new(poll),
            notice: None,
        }
    }

    pub fn store(&self) -> &ReconciliationStore {
        &self.store
    }

    pub fn env_id(&self) -> &str {
        &self.env_id
    }

    /// Apply one drained batch, in delivery order.
    pub fn apply_events(&mut self, events: Vec<InstanceEvent>, now: Instant) -> CoreStep {
        if events.is_empty() {
            return CoreStep::default();
        }
        handle_event_batch(&mut self.store, events, now)
    }

    pub fn poll_due(&self, now: Instant) -> bool {
        self.schedule.is_due(now)
    }

    /// Merge the result of a poll attempted at `now`.
    ///
    /// Recoverable failures keep the previous state and surface as the
    /// view's notice. Fatal failures propagate.
    pub fn apply_poll_result(&mut self, result: Result<Vec<JobRun>>, now: Instant) -> Result<()> {
        self.schedule.mark_attempt(now);
        self.notice = handle_poll_result(&mut self.store, result, now)?;
        Ok(())
    }

    pub fn apply_discovery(
        &mut self,
        id: &InstanceId,
        result: Result<Option<JobInstance>>,
    ) -> Result<bool> {
        handle_discovery(&mut self.store, id, result)
    }

    pub fn sweep(&mut self, now: Instant) -> SweepReport {
        let report = self.store.sweep(now);
        if !report.is_empty() {
            debug!(
                expired = report.expired.len(),
                crashed = report.crashed.len(),
                "sweep evicted runs"
            );
        }
        report
    }

    /// Build the next frame. Pure read of the store.
    pub fn view(&self, now: DateTime<Utc>) -> LiveView {
        let rows = self
            .store
            .snapshot(now)
            .into_iter()
            .map(|run| LiveRow {
                ended: self.store.is_ended(&run.instance_id),
                run,
            })
            .collect();

        LiveView {
            env_id: self.env_id.clone(),
            rows,
            notice: self.notice.clone(),
        }
    }
}
