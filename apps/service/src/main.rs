#![warn(clippy::all, clippy::pedantic)]

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use tracing::{info, warn};
use vicinity::{ErrorPolicy, Lifecycle, NoopTelemetry, Scheduler, Telemetry, TickRunner};

mod config;
mod error;
mod notifiers;
mod probers;
mod prometheus;
mod routes;
mod server;
#[cfg(test)]
mod test_support;
mod validation;
mod wiring;

use config::Config;
use error::AppError;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const COMMIT_HASH: &str = env!("VICINITY_COMMIT_HASH");
const LONG_VERSION: &str =
    concat!(env!("CARGO_PKG_VERSION"), " (", env!("VICINITY_COMMIT_HASH"), ")");

/// Report which devices are on the network to a home-automation system
#[derive(Debug, Parser)]
#[command(name = "vicinity", version = VERSION, long_version = LONG_VERSION, about)]
struct Cli {
    /// Config file, defaults to $XDG_CONFIG_HOME/vicinity/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single tick and exit
    #[arg(long)]
    once: bool,

    /// Write an example config to the config path and exit
    #[arg(long, conflicts_with = "once")]
    init: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    logger::init_tracing();

    if cli.init {
        let path = config::resolve_config_path(cli.config.as_ref())?;
        Config::example().write_config(&path)?;
        info!(path = %path.display(), "wrote example config");
        return Ok(());
    }

    info!("Starting vicinity {VERSION} ({COMMIT_HASH})");
    let config = Config::from_config(cli.config.as_ref())?;
    info!("{config}");

    let notifier = wiring::build_notifier(&config.notifier)?;
    let registry = wiring::build_registry(&config)?;

    let mut metrics_server = None;
    let telemetry: Arc<dyn Telemetry> = if config.metrics.enabled {
        let handle = prometheus::setup_metrics_recorder()?;
        prometheus::record_process_info(VERSION, COMMIT_HASH);
        match server::start_metrics_server(config.metrics_addr()?, handle) {
            Ok(server) => metrics_server = Some(server),
            Err(err) => warn!(error = %err, "could not start metrics server, continuing without it"),
        }
        Arc::new(prometheus::PrometheusTelemetry)
    } else {
        Arc::new(NoopTelemetry)
    };

    let runner = TickRunner::new(registry, notifier)
        .with_telemetry(telemetry)
        .with_error_policy(ErrorPolicy::from_notify_flag(config.notify_on_probe_error));

    if cli.once {
        let report = runner.run_tick().await;
        info!(?report, "single tick finished");
    } else {
        let lifecycle = Lifecycle::new();
        let _signals = lifecycle.install_signal_handler()?;

        let scheduler = Scheduler::new(runner, config.interval());
        scheduler.run(lifecycle.token()).await;
    }

    if let Some(server) = metrics_server {
        server.stop(true).await;
    }

    info!("vicinity stopped");
    Ok(())
}
