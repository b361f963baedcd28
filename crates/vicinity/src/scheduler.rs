use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{DEFAULT_TICK_INTERVAL, tick::TickRunner};

/// Drives the tick runner on a fixed cadence until cancelled.
///
/// The first tick runs immediately. Ticks never overlap: a tick that
/// outlasts the interval is followed by one immediate catch-up tick, after
/// which the original cadence resumes and the missed pulses are dropped.
/// Cancellation is only observed between ticks.
pub struct Scheduler {
    runner: TickRunner,
    interval: Duration,
}

impl Scheduler {
    /// Create a new scheduler. A zero interval falls back to
    /// [`DEFAULT_TICK_INTERVAL`].
    pub fn new(runner: TickRunner, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!("tick interval cannot be zero, using {:?}", DEFAULT_TICK_INTERVAL);
            DEFAULT_TICK_INTERVAL
        } else {
            interval
        };

        Self { runner, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn runner(&self) -> &TickRunner {
        &self.runner
    }

    /// Run until `cancel` fires and return how many ticks were executed.
    pub async fn run(&self, cancel: CancellationToken) -> u64 {
        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            probes = self.runner.registry().len(),
            interval_secs = self.interval.as_secs_f64(),
            policy = ?self.runner.error_policy(),
            "scheduler started"
        );

        let mut ticks = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = timer.tick() => {}
            }

            let started = Instant::now();
            let report = self.runner.run_tick().await;
            ticks += 1;

            let elapsed = started.elapsed();
            if elapsed > self.interval {
                warn!(
                    elapsed_secs = elapsed.as_secs_f64(),
                    interval_secs = self.interval.as_secs_f64(),
                    "tick took longer than the interval, next tick is delayed"
                );
            }
            info!(
                tick = ticks,
                present = report.present,
                absent = report.absent,
                probe_failures = report.probe_failures,
                notify_failures = report.notify_failures,
                "tick completed"
            );
        }

        info!(ticks, "scheduler stopped");
        ticks
    }
}
