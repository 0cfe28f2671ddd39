// tests/store_properties.rs

use std::time::{Duration, Instant};

use taro::criteria::RunCriteria;
use taro::engine::{EventEffect, Partition, ReconciliationStore, RetentionPolicy};
use taro::job::{JobRun, Stage, TerminationStatus};
use taro::types::{MatchingStrategy, SortOption};
use taro_test_utils::builders::{
    base_time, id, lifecycle_event, output_event, phase_event, root_ended, JobRunBuilder,
};
use taro_test_utils::init_tracing;

const RETENTION: Duration = Duration::from_secs(10);
const GRACE: Duration = Duration::from_secs(5);

fn store() -> ReconciliationStore {
    init_tracing();
    ReconciliationStore::new(
        RunCriteria::all(),
        RetentionPolicy {
            retention_window: RETENTION,
            grace_window: GRACE,
        },
    )
}

fn running(job: &str, run: &str) -> JobRun {
    JobRunBuilder::new(job, run).running().build()
}

fn ids(runs: &[JobRun]) -> Vec<String> {
    runs.iter().map(|r| r.instance_id.to_string()).collect()
}

#[test]
fn applying_the_same_poll_twice_equals_applying_it_once() {
    let t0 = Instant::now();
    let polled = vec![running("a", "1"), running("b", "1")];

    let mut once = store();
    once.apply_poll(polled.clone(), t0);

    let mut twice = store();
    twice.apply_poll(polled.clone(), t0);
    twice.apply_poll(polled, t0 + Duration::from_millis(300));

    assert_eq!(once.contents(), twice.contents());
}

#[test]
fn ended_run_is_never_revived_by_polls_or_events() {
    let t0 = Instant::now();
    let a = running("a", "1");
    let mut s = store();

    s.apply_poll(vec![a.clone()], t0);
    assert_eq!(s.apply_event(&root_ended(&a), t0), EventEffect::Ended);
    assert_eq!(s.partition_of(&a.instance_id), Some(Partition::Ended));

    // Stale poll answered before the end, then late events of every kind.
    s.apply_poll(vec![a.clone()], t0 + Duration::from_secs(1));
    assert_eq!(
        s.apply_event(&phase_event(&a, "step", Stage::Running), t0),
        EventEffect::Dropped
    );
    assert_eq!(s.apply_event(&lifecycle_event(&a), t0), EventEffect::Dropped);
    assert!(!s.discover(a.clone()));

    assert_eq!(s.partition_of(&a.instance_id), Some(Partition::Ended));
    assert_eq!(s.active_count(), 0);
    assert_eq!(s.missing_count(), 0);
}

#[test]
fn missing_run_survives_until_grace_window_elapses() {
    let t0 = Instant::now();
    let b = running("b", "1");
    let mut s = store();

    s.apply_poll(vec![b.clone()], t0);
    let t1 = t0 + Duration::from_secs(1);
    s.apply_poll(Vec::new(), t1);
    assert_eq!(s.partition_of(&b.instance_id), Some(Partition::Missing));

    // Later polls without the run must not reset the first-missing instant.
    s.apply_poll(Vec::new(), t1 + Duration::from_secs(3));

    let report = s.sweep(t1 + GRACE - Duration::from_millis(1));
    assert!(report.is_empty());
    assert_eq!(ids(&s.snapshot(base_time())), vec!["b@1"]);

    let report = s.sweep(t1 + GRACE);
    assert_eq!(report.crashed, vec![b.instance_id.clone()]);
    assert!(s.snapshot(base_time()).is_empty());
    assert_eq!(s.partition_of(&b.instance_id), None);
}

#[test]
fn ended_run_stays_visible_for_the_retention_window() {
    let t0 = Instant::now();
    let a = running("a", "1");
    let mut s = store();

    s.apply_poll(vec![a.clone()], t0);
    let ended_at = t0 + Duration::from_secs(2);
    s.apply_event(&root_ended(&a), ended_at);

    for offset in [0, 1, 5, 9] {
        s.sweep(ended_at + Duration::from_secs(offset));
        assert_eq!(ids(&s.snapshot(base_time())), vec!["a@1"], "offset {offset}s");
    }
    s.sweep(ended_at + RETENTION - Duration::from_millis(1));
    assert_eq!(s.ended_count(), 1);

    let report = s.sweep(ended_at + RETENTION);
    assert_eq!(report.expired, vec![a.instance_id.clone()]);
    assert!(s.snapshot(base_time()).is_empty());
}

#[test]
fn single_missed_poll_leaves_no_trace() {
    let t0 = Instant::now();
    let a = running("a", "1");

    let mut gapped = store();
    gapped.apply_poll(vec![a.clone()], t0);
    gapped.apply_poll(Vec::new(), t0 + Duration::from_secs(1));
    gapped.apply_poll(vec![a.clone()], t0 + Duration::from_secs(2));
    gapped.sweep(t0 + Duration::from_secs(20));

    let mut steady = store();
    steady.apply_poll(vec![a.clone()], t0);

    assert_eq!(gapped.ended_count(), 0);
    assert_eq!(gapped.missing_count(), 0);
    assert_eq!(gapped.snapshot(base_time()), steady.snapshot(base_time()));
}

#[test]
fn events_rejected_by_the_filter_leave_the_store_untouched() {
    let t0 = Instant::now();
    let criteria = RunCriteria::parse("backup@", MatchingStrategy::Exact).unwrap();
    let mut s = ReconciliationStore::new(criteria, RetentionPolicy::default());

    let backup = running("backup", "1");
    let other = running("report", "1");
    s.apply_poll(vec![backup.clone(), other.clone()], t0);
    assert_eq!(s.active_count(), 1, "poll result is filtered too");

    let before = s.contents();
    for event in [
        phase_event(&other, "step", Stage::Running),
        lifecycle_event(&other),
        root_ended(&other),
    ] {
        assert_eq!(s.apply_event(&event, t0), EventEffect::Dropped);
    }
    assert_eq!(s.contents(), before);
}

#[test]
fn ended_run_scenario_from_poll_to_eviction() {
    let t0 = Instant::now();
    let a = running("a", "1");
    let mut s = store();

    s.apply_poll(vec![a.clone()], t0);
    assert_eq!(s.snapshot(base_time()), vec![a.clone()]);

    s.apply_event(&root_ended(&a), t0);
    assert!(s.is_ended(&a.instance_id));
    let snapshot = s.snapshot(base_time());
    assert_eq!(ids(&snapshot), vec!["a@1"]);
    assert!(snapshot[0].is_ended());

    s.sweep(t0 + RETENTION + Duration::from_secs(1));
    assert!(s.snapshot(base_time()).is_empty());
}

#[test]
fn crashed_run_scenario_from_poll_to_eviction() {
    let t0 = Instant::now();
    let b = running("b", "1");
    let mut s = store();

    s.apply_poll(vec![b.clone()], t0);
    s.apply_poll(Vec::new(), t0);

    s.sweep(t0 + GRACE - Duration::from_secs(1));
    assert_eq!(ids(&s.snapshot(base_time())), vec!["b@1"]);

    s.sweep(t0 + GRACE + Duration::from_secs(1));
    assert!(s.snapshot(base_time()).is_empty());
}

#[test]
fn output_events_are_ignored() {
    let t0 = Instant::now();
    let a = running("a", "1");
    let mut s = store();
    s.apply_poll(vec![a.clone()], t0);
    let before = s.contents();

    let effect = s.apply_event(&output_event(&a.instance_id, "progress 50%"), t0);

    assert_eq!(effect, EventEffect::Dropped);
    assert_eq!(s.contents(), before);
}

#[test]
fn event_for_unseen_run_requests_discovery_without_mutating() {
    let t0 = Instant::now();
    let fresh = JobRunBuilder::new("new", "1").build();
    let mut s = store();
    let before = s.contents();

    let effect = s.apply_event(&lifecycle_event(&fresh), t0);

    assert_eq!(effect, EventEffect::Undiscovered(fresh.instance_id.clone()));
    assert_eq!(s.contents(), before);

    assert!(s.discover(fresh.clone()));
    assert_eq!(s.partition_of(&fresh.instance_id), Some(Partition::Active));
}

#[test]
fn event_for_known_run_refreshes_snapshot_and_clears_missing() {
    let t0 = Instant::now();
    let a = running("a", "1");
    let mut s = store();
    s.apply_poll(vec![a.clone()], t0);
    s.apply_poll(Vec::new(), t0 + Duration::from_secs(1));
    assert_eq!(s.partition_of(&a.instance_id), Some(Partition::Missing));

    let updated = JobRunBuilder::new("a", "1").running().status("halfway").build();
    let effect = s.apply_event(&phase_event(&updated, "step", Stage::Running), t0);

    assert_eq!(effect, EventEffect::Updated);
    assert_eq!(s.partition_of(&a.instance_id), Some(Partition::Active));
    assert_eq!(s.snapshot(base_time())[0].status.as_deref(), Some("halfway"));
}

#[test]
fn ended_snapshot_outside_root_transition_never_enters_active() {
    let t0 = Instant::now();
    let ended = JobRunBuilder::new("a", "1")
        .ended(TerminationStatus::Failed, 3)
        .build();
    let mut s = store();

    assert_eq!(s.apply_event(&lifecycle_event(&ended), t0), EventEffect::Dropped);
    assert!(!s.discover(ended.clone()));
    s.apply_poll(vec![ended.clone()], t0);

    assert_eq!(s.partition_of(&ended.instance_id), None);
}

#[test]
fn root_end_for_unseen_run_is_retained_directly() {
    let t0 = Instant::now();
    let a = running("a", "1");
    let mut s = store();

    assert_eq!(s.apply_event(&root_ended(&a), t0), EventEffect::Ended);
    assert_eq!(s.partition_of(&a.instance_id), Some(Partition::Ended));
}

#[test]
fn snapshot_follows_the_configured_order() {
    let t0 = Instant::now();
    let mut s = store().with_order(SortOption::JobId, true);
    s.apply_poll(
        vec![
            JobRunBuilder::new("b", "1").created_after(1).build(),
            JobRunBuilder::new("c", "1").created_after(0).build(),
            JobRunBuilder::new("a", "1").created_after(2).build(),
        ],
        t0,
    );

    assert_eq!(ids(&s.snapshot(base_time())), vec!["c@1", "b@1", "a@1"]);

    let by_created = {
        let mut s2 = store();
        s2.apply_poll(s.snapshot(base_time()), t0);
        s2.snapshot(base_time())
    };
    assert_eq!(ids(&by_created), vec!["c@1", "b@1", "a@1"]);
    assert_eq!(id("c", "1"), by_created[0].instance_id);
}
