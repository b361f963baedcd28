//! Cadence, serialization and cancellation of the scheduler loop.

mod common;

use std::{sync::Arc, time::Duration};

use common::{Outcome, RecordingNotifier, ScriptedProber};
use vicinity::{CancellationToken, Counters, Lifecycle, ProbeRegistry, Scheduler, TickRunner};

fn single_probe(
    outcome: Outcome,
    delay: Duration,
) -> (TickRunner, common::ProbeHandle, Arc<RecordingNotifier>, Arc<Counters>) {
    let (prober, handle) = ScriptedProber::delayed(outcome, delay);
    let registry = ProbeRegistry::builder().register("phone", "fake", prober).unwrap().build();
    let notifier = RecordingNotifier::new();
    let counters = Arc::new(Counters::new());
    let runner = TickRunner::new(registry, notifier.clone()).with_telemetry(counters.clone());
    (runner, handle, notifier, counters)
}

#[tokio::test(start_paused = true)]
async fn test_first_tick_runs_immediately() {
    let (runner, handle, notifier, _) = single_probe(Outcome::Present, Duration::ZERO);
    let scheduler = Scheduler::new(runner, Duration::from_secs(30));
    let cancel = CancellationToken::new();

    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(handle.calls(), 1);
    assert_eq!(notifier.calls_for("phone"), 1);

    cancel.cancel();
    assert_eq!(task.await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ticks_follow_interval() {
    let (runner, handle, _, counters) = single_probe(Outcome::Absent, Duration::ZERO);
    let scheduler = Scheduler::new(runner, Duration::from_secs(30));
    let cancel = CancellationToken::new();

    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });
    tokio::time::sleep(Duration::from_secs(65)).await;
    cancel.cancel();

    assert_eq!(task.await.unwrap(), 3);
    assert_eq!(handle.calls(), 3);
    assert_eq!(counters.ticks(), 3);

    let started = handle.started_at();
    for pair in started.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_secs(30) && gap < Duration::from_secs(31), "gap {gap:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_ticks_never_overlap() {
    let probe_time = Duration::from_secs(45);
    let (runner, handle, _, _) = single_probe(Outcome::Present, probe_time);
    let scheduler = Scheduler::new(runner, Duration::from_secs(30));
    let cancel = CancellationToken::new();

    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });
    tokio::time::sleep(Duration::from_secs(100)).await;
    cancel.cancel();
    let ticks = task.await.unwrap();

    let started = handle.started_at();
    assert_eq!(started.len() as u64, ticks);
    assert!(ticks >= 2);
    for pair in started.windows(2) {
        assert!(pair[1] - pair[0] >= probe_time, "tick started before the previous one finished");
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_lets_in_flight_tick_finish() {
    let (runner, handle, notifier, _) = single_probe(Outcome::Present, Duration::from_secs(20));
    let scheduler = Scheduler::new(runner, Duration::from_secs(30));
    let cancel = CancellationToken::new();

    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(handle.calls(), 1);
    assert_eq!(handle.completed(), 0);

    cancel.cancel();
    let ticks = task.await.unwrap();

    assert_eq!(ticks, 1);
    assert_eq!(handle.completed(), 1);
    assert_eq!(notifier.calls_for("phone"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_tick_after_cancellation() {
    let (runner, handle, _, _) = single_probe(Outcome::Present, Duration::ZERO);
    let scheduler = Scheduler::new(runner, Duration::from_secs(30));
    let lifecycle = Lifecycle::new();

    let task = tokio::spawn({
        let cancel = lifecycle.token();
        async move { scheduler.run(cancel).await }
    });
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(lifecycle.request_shutdown());
    let ticks = task.await.unwrap();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(ticks, 1);
    assert_eq!(handle.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_already_cancelled_token_runs_no_tick() {
    let (runner, handle, _, _) = single_probe(Outcome::Present, Duration::ZERO);
    let scheduler = Scheduler::new(runner, Duration::from_secs(30));
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert_eq!(scheduler.run(cancel).await, 0);
    assert_eq!(handle.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_probe_failures_do_not_stop_the_loop() {
    let (runner, handle, notifier, counters) = single_probe(Outcome::Fails, Duration::ZERO);
    let scheduler = Scheduler::new(runner, Duration::from_secs(30));
    let cancel = CancellationToken::new();

    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });
    tokio::time::sleep(Duration::from_secs(95)).await;
    cancel.cancel();

    assert_eq!(task.await.unwrap(), 4);
    assert_eq!(handle.calls(), 4);
    assert_eq!(counters.probe_failures("fake", "phone"), 4);
    assert_eq!(notifier.calls_for("phone"), 4);
}

#[test]
fn test_zero_interval_uses_default() {
    let (runner, _, _, _) = single_probe(Outcome::Present, Duration::ZERO);
    let scheduler = Scheduler::new(runner, Duration::ZERO);

    assert_eq!(scheduler.interval(), vicinity::DEFAULT_TICK_INTERVAL);
}
