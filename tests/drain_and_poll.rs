// tests/drain_and_poll.rs

use std::time::{Duration, Instant};

use taro::engine::{EventDrain, PollSchedule};
use taro::types::PollStrategy;
use taro_test_utils::builders::{id, output_event};
use taro_test_utils::init_tracing;
use tokio::sync::mpsc;

#[tokio::test(start_paused = true)]
async fn quiet_queue_times_out_with_empty_batch() {
    init_tracing();
    let (_tx, rx) = mpsc::unbounded_channel();
    let mut drain = EventDrain::new(rx, Duration::from_secs(1));

    let started = tokio::time::Instant::now();
    let batch = drain.next_batch().await;

    assert!(batch.is_empty());
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(1) && waited < Duration::from_millis(1010), "{waited:?}");
    assert!(!drain.is_closed());
}

#[tokio::test(start_paused = true)]
async fn burst_is_drained_in_delivery_order_without_waiting() {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut drain = EventDrain::new(rx, Duration::from_secs(1));
    for n in 0..5 {
        tx.send(output_event(&id("job", &n.to_string()), "line")).unwrap();
    }

    let started = tokio::time::Instant::now();
    let batch = drain.next_batch().await;

    assert_eq!(started.elapsed(), Duration::ZERO);
    let runs: Vec<String> = batch.iter().map(|e| e.instance_id().run_id.clone()).collect();
    assert_eq!(runs, vec!["0", "1", "2", "3", "4"]);
}

#[tokio::test(start_paused = true)]
async fn burst_size_is_capped() {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut drain = EventDrain::new(rx, Duration::from_secs(1)).with_max_burst(3);
    for n in 0..5 {
        tx.send(output_event(&id("job", &n.to_string()), "line")).unwrap();
    }

    assert_eq!(drain.next_batch().await.len(), 3);
    assert_eq!(drain.next_batch().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn closed_queue_still_paces_the_loop() {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut drain = EventDrain::new(rx, Duration::from_millis(500));
    tx.send(output_event(&id("job", "1"), "last")).unwrap();
    drop(tx);

    assert_eq!(drain.next_batch().await.len(), 1);
    assert!(drain.is_closed());

    let started = tokio::time::Instant::now();
    assert!(drain.next_batch().await.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(500));
}

#[test]
fn every_tick_schedule_is_always_due() {
    let t0 = Instant::now();
    let mut schedule = PollSchedule::new(PollStrategy::EveryTick);
    assert!(schedule.is_due(t0));
    schedule.mark_attempt(t0);
    assert!(schedule.is_due(t0));
}

#[test]
fn interval_schedule_waits_between_attempts() {
    let t0 = Instant::now();
    let mut schedule = PollSchedule::new(PollStrategy::Interval(Duration::from_secs(10)));
    assert!(schedule.is_due(t0), "first poll is immediate");

    schedule.mark_attempt(t0);
    assert!(!schedule.is_due(t0 + Duration::from_secs(9)));
    assert!(schedule.is_due(t0 + Duration::from_secs(10)));
}

#[test]
fn poll_strategy_parses_tick_or_duration() {
    assert_eq!("tick".parse::<PollStrategy>(), Ok(PollStrategy::EveryTick));
    assert_eq!(
        "250ms".parse::<PollStrategy>(),
        Ok(PollStrategy::Interval(Duration::from_millis(250)))
    );
    assert!("often".parse::<PollStrategy>().is_err());
}
