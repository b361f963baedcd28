//! One round of presence checks across every registered probe.
//!
//! Every probe runs in its own task. A unit probes, applies the
//! [`ErrorPolicy`], translates the outcome and notifies. Units are fully
//! isolated: a failing or panicking probe or notifier only affects its own
//! target. [`TickRunner::run_tick`] returns once every unit has finished.

use std::sync::Arc;

use tokio::{
    task::{JoinError, JoinSet},
    time::Instant,
};
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, warn};

use crate::{
    error::{NotifyError, ProbeError},
    notifier::Notifier,
    prober::{ProbeEntry, ProbeRegistry},
    signal::{Signal, translate},
    telemetry::{NoopTelemetry, Telemetry},
};

/// What to do with a target whose probe failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Send `not_home` for the failed target
    #[default]
    Notify,
    /// Send nothing for the failed target this tick
    Skip,
}

impl ErrorPolicy {
    /// Map the `notify_on_probe_error` flag to a policy
    pub const fn from_notify_flag(notify_on_error: bool) -> Self {
        if notify_on_error { ErrorPolicy::Notify } else { ErrorPolicy::Skip }
    }
}

/// Summary of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Units launched, one per registered probe
    pub probed: usize,
    pub present: usize,
    pub absent: usize,
    pub probe_failures: usize,
    /// Failed probes that sent nothing because of [`ErrorPolicy::Skip`]
    pub skipped: usize,
    /// Notifications delivered successfully
    pub notified: usize,
    pub notify_failures: usize,
    /// Units that died before producing an outcome
    pub aborted: usize,
}

impl TickReport {
    fn record(&mut self, outcome: UnitOutcome) {
        match outcome.probe {
            ProbeStatus::Present => self.present += 1,
            ProbeStatus::Absent => self.absent += 1,
            ProbeStatus::Failed => self.probe_failures += 1,
        }
        match outcome.dispatch {
            Dispatch::Delivered => self.notified += 1,
            Dispatch::Failed => self.notify_failures += 1,
            Dispatch::Skipped => self.skipped += 1,
        }
    }

    /// Notification attempts made during the tick
    pub fn dispatched(&self) -> usize {
        self.notified + self.notify_failures
    }
}

#[derive(Debug, Clone, Copy)]
enum ProbeStatus {
    Present,
    Absent,
    Failed,
}

#[derive(Debug, Clone, Copy)]
enum Dispatch {
    Delivered,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy)]
struct UnitOutcome {
    probe: ProbeStatus,
    dispatch: Dispatch,
}

/// Runs every registered probe once per call and dispatches the results.
pub struct TickRunner {
    registry: Arc<ProbeRegistry>,
    notifier: Arc<dyn Notifier>,
    telemetry: Arc<dyn Telemetry>,
    policy: ErrorPolicy,
}

impl TickRunner {
    /// Create a runner with the default error policy and no telemetry
    pub fn new(registry: ProbeRegistry, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            registry: Arc::new(registry),
            notifier,
            telemetry: Arc::new(NoopTelemetry),
            policy: ErrorPolicy::default(),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &ProbeRegistry {
        &self.registry
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Probe every target concurrently and notify each result.
    ///
    /// Never fails: per-target errors are logged, counted on the telemetry
    /// sink and reflected in the returned report.
    pub async fn run_tick(&self) -> TickReport {
        let started = Instant::now();
        let mut units = JoinSet::new();

        for entry in self.registry.iter() {
            units.spawn(run_unit(
                entry.clone(),
                Arc::clone(&self.notifier),
                Arc::clone(&self.telemetry),
                self.policy,
            ));
        }

        let mut report = TickReport { probed: self.registry.len(), ..TickReport::default() };
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(err) => {
                    error!(error = %err, "probe unit terminated abnormally");
                    report.aborted += 1;
                }
            }
        }

        let elapsed = started.elapsed();
        self.telemetry.tick_completed(&report, elapsed);
        debug!(?report, elapsed_ms = elapsed.as_millis() as u64, "tick finished");

        report
    }
}

async fn run_unit(
    entry: ProbeEntry,
    notifier: Arc<dyn Notifier>,
    telemetry: Arc<dyn Telemetry>,
    policy: ErrorPolicy,
) -> UnitOutcome {
    let name = entry.name();

    let (presence, probe) = match check_isolated(&entry).await {
        Ok(true) => (true, ProbeStatus::Present),
        Ok(false) => (false, ProbeStatus::Absent),
        Err(err) => {
            error!(name, prober = entry.kind(), error = %err, "error probing target");
            telemetry.probe_failed(entry.kind(), name);
            if policy == ErrorPolicy::Skip {
                return UnitOutcome { probe: ProbeStatus::Failed, dispatch: Dispatch::Skipped };
            }
            // The real state is unknown here; report it as absent.
            (false, ProbeStatus::Failed)
        }
    };

    let signal = translate(presence);
    let dispatch = match notify_isolated(&notifier, name, signal).await {
        Ok(()) => {
            debug!(name, %signal, "dispatched presence signal");
            Dispatch::Delivered
        }
        Err(err) => {
            warn!(name, %signal, error = %err, "error dispatching presence signal");
            telemetry.notify_failed(name);
            Dispatch::Failed
        }
    };

    UnitOutcome { probe, dispatch }
}

/// Run the probe on its own task so a panic surfaces as a probe failure.
/// The task is aborted with the unit that owns it.
async fn check_isolated(entry: &ProbeEntry) -> Result<bool, ProbeError> {
    let prober = Arc::clone(entry.prober());
    AbortOnDropHandle::new(tokio::spawn(async move { prober.check().await }))
        .await
        .map_err(|err| ProbeError::Panicked(join_error_message(err)))?
}

async fn notify_isolated(
    notifier: &Arc<dyn Notifier>,
    name: &str,
    signal: Signal,
) -> Result<(), NotifyError> {
    let notifier = Arc::clone(notifier);
    let name = name.to_string();
    AbortOnDropHandle::new(tokio::spawn(async move { notifier.notify(&name, signal).await }))
        .await
        .map_err(|err| NotifyError::Panicked(join_error_message(err)))?
}

fn join_error_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
