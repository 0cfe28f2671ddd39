// src/engine/store.rs

//! Reconciliation store: the merged view behind `live`.
//!
//! Three partitions keyed by [`InstanceId`]:
//! - `active`: runs believed not ended
//! - `ended`: runs whose root phase ended, kept visible for the retention
//!   window
//! - `missing`: ids of `active` runs absent from the latest poll, with the
//!   instant they were first found missing
//!
//! An id is in at most one of `active` / `ended`, and `missing` only ever
//! holds ids that are also in `active`. Every mutation keeps both facts true
//! before it returns.
//!
//! All operations take the current monotonic instant explicitly, so the
//! store never reads a clock itself.

use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::criteria::RunCriteria;
use crate::job::{InstanceEvent, InstanceId, JobRun};
use crate::types::SortOption;

/// The two independent eviction timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// How long an ended run stays visible after its `Ended` event.
    pub retention_window: Duration,
    /// How long an active run may be absent from polls before it is treated
    /// as crashed.
    pub grace_window: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retention_window: Duration::from_secs(10),
            grace_window: Duration::from_secs(5),
        }
    }
}

/// Which partition currently holds an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Active,
    /// In `active` and also absent from the latest poll.
    Missing,
    Ended,
}

/// What [`ReconciliationStore::apply_event`] did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventEffect {
    /// Output event, rejected by the filter, stale, or an ended snapshot
    /// outside the root-phase transition. Store untouched.
    Dropped,
    /// Run moved to the ended partition.
    Ended,
    /// Snapshot of a known active run refreshed.
    Updated,
    /// The event references a run the store has never seen. Nothing was
    /// recorded; the caller should check the run exists in the environment
    /// and seed it through [`ReconciliationStore::discover`].
    Undiscovered(InstanceId),
}

/// Ids evicted by one [`ReconciliationStore::sweep`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Ended runs past the retention window.
    pub expired: Vec<InstanceId>,
    /// Active runs missing for the whole grace window.
    pub crashed: Vec<InstanceId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.crashed.is_empty()
    }
}

/// Owned copy of all partitions, for comparisons in tests and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreContents {
    pub active: BTreeMap<InstanceId, JobRun>,
    pub ended: BTreeMap<InstanceId, (JobRun, Instant)>,
    pub missing: BTreeMap<InstanceId, Instant>,
}

#[derive(Debug)]
pub struct ReconciliationStore {
    criteria: RunCriteria,
    policy: RetentionPolicy,
    sort: SortOption,
    descending: bool,
    active: BTreeMap<InstanceId, JobRun>,
    ended: BTreeMap<InstanceId, (JobRun, Instant)>,
    missing: BTreeMap<InstanceId, Instant>,
}

impl ReconciliationStore {
    pub fn new(criteria: RunCriteria, policy: RetentionPolicy) -> Self {
        Self {
            criteria,
            policy,
            sort: SortOption::default(),
            descending: false,
            active: BTreeMap::new(),
            ended: BTreeMap::new(),
            missing: BTreeMap::new(),
        }
    }

    pub fn with_order(mut self, sort: SortOption, descending: bool) -> Self {
        self.sort = sort;
        self.descending = descending;
        self
    }

    pub fn criteria(&self) -> &RunCriteria {
        &self.criteria
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Merge an authoritative poll result: the complete set of non-ended
    /// runs matching the criteria as of `now`.
    ///
    /// Polled runs are upserted and lose any missing mark. Active runs absent
    /// from the poll are marked missing (first time only); they are never
    /// evicted here.
    pub fn apply_poll<I>(&mut self, polled: I, now: Instant)
    where
        I: IntoIterator<Item = JobRun>,
    {
        let mut seen: HashSet<InstanceId> = HashSet::new();

        for run in polled {
            if run.is_ended() || !self.criteria.matches(&run) {
                continue;
            }
            let id = run.instance_id.clone();
            seen.insert(id.clone());
            // The poll may have been answered before the run ended; the
            // ended partition wins.
            if self.ended.contains_key(&id) {
                continue;
            }
            self.missing.remove(&id);
            self.active.insert(id, run);
        }

        for id in self.active.keys() {
            if !seen.contains(id) && !self.missing.contains_key(id) {
                debug!(instance = %id, "run absent from poll; marked missing");
                self.missing.insert(id.clone(), now);
            }
        }
    }

    /// Apply a single notification.
    pub fn apply_event(&mut self, event: &InstanceEvent, now: Instant) -> EventEffect {
        let Some(run) = event.run() else {
            return EventEffect::Dropped;
        };
        if !self.criteria.matches(run) {
            return EventEffect::Dropped;
        }
        let id = &run.instance_id;

        if event.ends_run() {
            self.active.remove(id);
            self.missing.remove(id);
            self.ended.insert(id.clone(), (run.clone(), now));
            debug!(instance = %id, "run ended");
            return EventEffect::Ended;
        }

        if self.ended.contains_key(id) || run.is_ended() {
            trace!(instance = %id, "late event for ended run dropped");
            return EventEffect::Dropped;
        }

        match self.active.get_mut(id) {
            Some(slot) => {
                *slot = run.clone();
                self.missing.remove(id);
                EventEffect::Updated
            }
            None => EventEffect::Undiscovered(id.clone()),
        }
    }

    /// Seed `active` with a run fetched from the environment after an event
    /// referenced it. Returns `false` when the run must not become active:
    /// it already ended, ended meanwhile, or does not match the criteria.
    pub fn discover(&mut self, run: JobRun) -> bool {
        let id = run.instance_id.clone();
        if run.is_ended() || self.ended.contains_key(&id) || !self.criteria.matches(&run) {
            return false;
        }
        self.missing.remove(&id);
        self.active.insert(id, run);
        true
    }

    /// Evict ended runs past the retention window and missing runs past the
    /// grace window.
    pub fn sweep(&mut self, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();
        let RetentionPolicy {
            retention_window,
            grace_window,
        } = self.policy;

        self.ended.retain(|id, (_, observed_at)| {
            let keep = now.saturating_duration_since(*observed_at) < retention_window;
            if !keep {
                report.expired.push(id.clone());
            }
            keep
        });

        self.missing.retain(|id, first_missing_at| {
            let keep = now.saturating_duration_since(*first_missing_at) < grace_window;
            if !keep {
                report.crashed.push(id.clone());
            }
            keep
        });
        for id in &report.crashed {
            self.active.remove(id);
            debug!(instance = %id, "run missing past grace window; evicted as crashed");
        }

        report
    }

    /// Active and retained ended runs in display order. Pure read.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Vec<JobRun> {
        let mut runs: Vec<JobRun> = self
            .active
            .values()
            .chain(self.ended.values().map(|(run, _)| run))
            .cloned()
            .collect();
        self.sort.sort_runs(&mut runs, self.descending, now);
        runs
    }

    pub fn partition_of(&self, id: &InstanceId) -> Option<Partition> {
        if self.ended.contains_key(id) {
            Some(Partition::Ended)
        } else if self.missing.contains_key(id) {
            Some(Partition::Missing)
        } else if self.active.contains_key(id) {
            Some(Partition::Active)
        } else {
            None
        }
    }

    pub fn is_ended(&self, id: &InstanceId) -> bool {
        self.ended.contains_key(id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn ended_count(&self) -> usize {
        self.ended.len()
    }

    pub fn missing_count(&self) -> usize {
        self.missing.len()
    }

    pub fn contents(&self) -> StoreContents {
        StoreContents {
            active: self.active.clone(),
            ended: self.ended.clone(),
            missing: self.missing.clone(),
        }
    }
}
