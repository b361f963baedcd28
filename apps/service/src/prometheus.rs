//! Prometheus metrics for the presence daemon.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use vicinity::{Telemetry, TickReport};

pub const VERSION: &str = "vicinity_version";
pub const START_TIME: &str = "vicinity_start_time_seconds";
pub const PROBE_ERRORS: &str = "vicinity_probes_errors_total";
pub const NOTIFICATION_ERRORS: &str = "vicinity_notification_errors_total";
pub const TICKS: &str = "vicinity_ticks_total";
pub const TICK_DURATION: &str = "vicinity_tick_duration_seconds";
pub const TARGETS_PRESENT: &str = "vicinity_targets_present";
pub const MQTT_RECONNECTIONS: &str = "vicinity_mqtt_reconnections_total";
pub const MQTT_BROKERS_CONNECTED: &str = "vicinity_mqtt_brokers_connected_total";
pub const MQTT_CONNECTIONS_LOST: &str = "vicinity_mqtt_connections_lost_total";

pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    const EXPONENTIAL_SECONDS: &[f64] =
        &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

    PrometheusBuilder::new().set_buckets(EXPONENTIAL_SECONDS)?.install_recorder()
}

/// Publish the build info and process start time gauges
pub fn record_process_info(version: &'static str, hash: &'static str) {
    gauge!(VERSION, "version" => version, "hash" => hash).set(1.0);

    let started = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
    gauge!(START_TIME).set(started.as_secs_f64());
}

/// [`Telemetry`] sink writing to the global `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusTelemetry;

impl Telemetry for PrometheusTelemetry {
    fn probe_failed(&self, prober: &str, target: &str) {
        counter!(PROBE_ERRORS, "prober" => prober.to_string(), "name" => target.to_string())
            .increment(1);
    }

    fn notify_failed(&self, target: &str) {
        counter!(NOTIFICATION_ERRORS, "name" => target.to_string()).increment(1);
    }

    fn tick_completed(&self, report: &TickReport, elapsed: Duration) {
        counter!(TICKS).increment(1);
        histogram!(TICK_DURATION).record(elapsed.as_secs_f64());
        gauge!(TARGETS_PRESENT).set(report.present as f64);
    }
}
