// src/engine/mod.rs

//! Live view engine.
//!
//! This module ties together:
//! - the reconciliation store (events, polls and eviction timers merged
//!   into one view)
//! - the event drain (notification queue to per-tick batches)
//! - the poll schedule
//! - the render contract
//! - the main loop reacting to:
//!   - instance notifications
//!   - poll results
//!   - shutdown signals
//!
//! The pure core lives in [`core`]; the async/IO shell is implemented in
//! [`runtime`].

use std::time::Duration;

use crate::types::{PollStrategy, SortOption};

/// Default upper bound on how long one tick waits for the first event.
pub const DEFAULT_FIRST_EVENT_WAIT: Duration = Duration::from_secs(1);

/// Default bound on a single environment call made by the live loop.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Options of one live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveOptions {
    pub policy: RetentionPolicy,
    pub poll: PollStrategy,
    /// Bound on the wait for the first event of a tick; also the tick
    /// cadence when the environment is quiet.
    pub first_event_wait: Duration,
    /// Bound on one poll or discovery fetch. A call exceeding it counts as
    /// a transport failure.
    pub call_timeout: Duration,
    pub max_burst: usize,
    pub sort: SortOption,
    pub descending: bool,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            policy: RetentionPolicy::default(),
            poll: PollStrategy::default(),
            first_event_wait: DEFAULT_FIRST_EVENT_WAIT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_burst: DEFAULT_MAX_BURST,
            sort: SortOption::default(),
            descending: false,
        }
    }
}

pub mod core;
pub mod drain;
pub mod event_handlers;
pub mod poll;
pub mod render;
pub mod runtime;
pub mod shutdown;
pub mod store;

pub use core::LiveCore;
pub use drain::{EventDrain, DEFAULT_MAX_BURST};
pub use event_handlers::{CoreCommand, CoreStep};
pub use poll::PollSchedule;
pub use render::{open_detail, DetailView, LiveRow, LiveView, RenderSink};
pub use runtime::LiveRuntime;
pub use shutdown::{shutdown_channel, ShutdownHandle, ShutdownSignal};
pub use store::{EventEffect, Partition, ReconciliationStore, RetentionPolicy, SweepReport};
