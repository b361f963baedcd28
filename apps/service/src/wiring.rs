//! Turns the parsed config into notifier and probe instances.

use std::sync::Arc;

use anyhow::{Context, Result};
use vicinity::{Notifier, ProbeRegistry, Prober};

use crate::{
    config::{Config, NotifierConfig, PingConfig, ProbeConfig, ProbeKind},
    notifiers::{LogNotifier, MqttNotifier, WebhookNotifier},
    probers::{HttpProber, PingProber, TcpProber},
};

pub fn build_notifier(config: &NotifierConfig) -> Result<Arc<dyn Notifier>> {
    let notifier: Arc<dyn Notifier> = match config {
        NotifierConfig::Webhook(webhook) => Arc::new(
            WebhookNotifier::new(webhook).context("could not build webhook notifier")?,
        ),
        NotifierConfig::Mqtt(mqtt) => Arc::new(
            MqttNotifier::connect(mqtt)
                .with_context(|| format!("could not set up MQTT client for {}", mqtt.broker))?,
        ),
        NotifierConfig::Log => Arc::new(LogNotifier),
    };

    Ok(notifier)
}

pub fn build_prober(probe: &ProbeConfig, ping: &PingConfig) -> Result<Arc<dyn Prober>> {
    let prober: Arc<dyn Prober> = match probe.kind {
        ProbeKind::Ping => Arc::new(PingProber::new(
            probe.target.clone(),
            probe.count.unwrap_or(ping.count),
            probe.timeout(ping.timeout_secs),
            ping,
        )),
        ProbeKind::Tcp => Arc::new(TcpProber::new(
            probe.target.clone(),
            probe.timeout(crate::config::DEFAULT_PROBE_TIMEOUT_SECS),
        )),
        ProbeKind::Http => Arc::new(
            HttpProber::new(
                probe.target.clone(),
                probe.timeout(crate::config::DEFAULT_PROBE_TIMEOUT_SECS),
            )
            .with_context(|| format!("could not build probe for {}", probe.target))?,
        ),
    };

    Ok(prober)
}

pub fn build_registry(config: &Config) -> Result<ProbeRegistry> {
    let mut builder = ProbeRegistry::builder();

    for probe in &config.probes {
        let prober = build_prober(probe, &config.ping)?;
        builder = builder
            .register_shared(probe.name.clone(), probe.kind.as_str(), prober)
            .with_context(|| format!("could not register probe '{}'", probe.name))?;
    }

    Ok(builder.build())
}
