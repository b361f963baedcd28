//! Vicinity - presence probing and dispatch engine
//!
//! This library runs a fixed set of presence probes on a cadence and forwards
//! every outcome to a notification sink as a `home` / `not_home` signal.
//! Concrete probes, transports and metrics backends plug in through the
//! [`Prober`], [`Notifier`] and [`Telemetry`] traits.

pub mod error;
pub mod lifecycle;
pub mod notifier;
pub mod prober;
pub mod scheduler;
pub mod signal;
pub mod telemetry;
pub mod tick;

use std::time::Duration;

// Re-export main types
pub use error::{NotifyError, ProbeError, RegistryError};
pub use lifecycle::Lifecycle;
pub use notifier::Notifier;
pub use prober::{ProbeEntry, ProbeRegistry, ProbeRegistryBuilder, Prober};
pub use scheduler::Scheduler;
pub use signal::{Signal, translate};
pub use telemetry::{Counters, NoopTelemetry, Telemetry};
pub use tick::{ErrorPolicy, TickReport, TickRunner};

/// Re-export of the cancellation primitive the scheduler observes
pub use tokio_util::sync::CancellationToken;

/// Interval between two ticks when none is configured
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(30);
