// src/engine/poll.rs

//! When to re-poll the environment.

use std::time::Instant;

use crate::types::PollStrategy;

#[derive(Debug, Clone)]
pub struct PollSchedule {
    strategy: PollStrategy,
    last_attempt: Option<Instant>,
}

impl PollSchedule {
    pub fn new(strategy: PollStrategy) -> Self {
        Self {
            strategy,
            last_attempt: None,
        }
    }

    pub fn strategy(&self) -> PollStrategy {
        self.strategy
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match (self.strategy, self.last_attempt) {
            (_, None) | (PollStrategy::EveryTick, _) => true,
            (PollStrategy::Interval(interval), Some(last)) => {
                now.saturating_duration_since(last) >= interval
            }
        }
    }

    /// Record an attempt. Failed polls count too: a broken environment is
    /// retried on the normal cadence, not hammered.
    pub fn mark_attempt(&mut self, now: Instant) {
        self.last_attempt = Some(now);
    }
}
