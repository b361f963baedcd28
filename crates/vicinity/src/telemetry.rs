//! Observability sink the tick runner reports failures to.

use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use crate::tick::TickReport;

/// Receives failure and tick events from concurrently running probe units.
///
/// Called from many tasks at once, so implementations must be internally
/// synchronized. None of the methods may block for long.
pub trait Telemetry: Send + Sync {
    /// A probe of kind `prober` failed for `target`
    fn probe_failed(&self, prober: &str, target: &str);

    /// Delivering the signal for `target` failed
    fn notify_failed(&self, target: &str);

    /// A tick joined all of its units
    fn tick_completed(&self, _report: &TickReport, _elapsed: Duration) {}
}

/// Telemetry sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn probe_failed(&self, _prober: &str, _target: &str) {}

    fn notify_failed(&self, _target: &str) {}
}

/// In-memory counters keyed the same way the exported metrics are.
#[derive(Debug, Default)]
pub struct Counters {
    probe_failures: Mutex<HashMap<(String, String), u64>>,
    notify_failures: Mutex<HashMap<String, u64>>,
    ticks: AtomicU64,
    last_report: Mutex<Option<TickReport>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Failures recorded for one (prober kind, target) pair
    pub fn probe_failures(&self, prober: &str, target: &str) -> u64 {
        lock(&self.probe_failures)
            .get(&(prober.to_string(), target.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn total_probe_failures(&self) -> u64 {
        lock(&self.probe_failures).values().sum()
    }

    pub fn notify_failures(&self, target: &str) -> u64 {
        lock(&self.notify_failures).get(target).copied().unwrap_or(0)
    }

    pub fn total_notify_failures(&self) -> u64 {
        lock(&self.notify_failures).values().sum()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn last_report(&self) -> Option<TickReport> {
        *lock(&self.last_report)
    }
}

impl Telemetry for Counters {
    fn probe_failed(&self, prober: &str, target: &str) {
        *lock(&self.probe_failures).entry((prober.to_string(), target.to_string())).or_default() +=
            1;
    }

    fn notify_failed(&self, target: &str) {
        *lock(&self.notify_failures).entry(target.to_string()).or_default() += 1;
    }

    fn tick_completed(&self, report: &TickReport, _elapsed: Duration) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        *lock(&self.last_report) = Some(*report);
    }
}
