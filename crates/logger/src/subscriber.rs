use std::{env::var, str::FromStr};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of the log lines, selected with `RUST_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl LogFormat {
    fn from_env() -> (Self, Option<String>) {
        match var("RUST_LOG_FORMAT") {
            Ok(raw) => match raw.parse() {
                Ok(format) => (format, None),
                Err(err) => (Self::default(), Some(err)),
            },
            Err(_) => (Self::default(), None),
        }
    }
}

/// Initialize the global subscriber at INFO, overridable through `RUST_LOG`.
pub fn init_tracing() {
    init_tracing_with(LevelFilter::INFO);
}

/// Initialize the global subscriber with `level` as the default directive.
///
/// Calling this more than once is harmless: later calls leave the first
/// subscriber in place.
pub fn init_tracing_with(level: LevelFilter) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();
    let (format, format_error) = LogFormat::from_env();

    let log_layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Compact => {
            tracing_subscriber::fmt::layer().compact().with_filter(env_filter).boxed()
        }
    };

    if tracing_subscriber::registry().with(log_layer).try_init().is_err() {
        return;
    }

    if let Some(error) = format_error {
        tracing::warn!("Ignoring RUST_LOG_FORMAT, falling back to compact output: {error}");
    }
}
