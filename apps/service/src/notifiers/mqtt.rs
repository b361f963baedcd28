//! MQTT notifier: publishes each signal to a per-target topic.
//!
//! The client keeps a single broker connection alive from a background
//! task. That task reconnects with a capped backoff and keeps the
//! connection gauges up to date.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use metrics::{counter, gauge};
use rumqttc::{
    AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS, TlsConfiguration,
    Transport,
};
use thiserror::Error;
use tracing::{debug, info, trace, warn};
use url::Url;
use vicinity::{Notifier, NotifyError, Signal};

use crate::{
    config::MqttConfig,
    prometheus::{MQTT_BROKERS_CONNECTED, MQTT_CONNECTIONS_LOST, MQTT_RECONNECTIONS},
};

const NAME_PLACEHOLDER: &str = "{name}";
const KEEP_ALIVE: Duration = Duration::from_secs(30);
const REQUEST_CAPACITY: usize = 64;
const MIN_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum MqttSetupError {
    #[error("invalid broker: {0}")]
    InvalidBroker(String),
    #[error("could not read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Host, port and transport taken from a broker URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl BrokerAddress {
    pub fn parse(broker: &str) -> Result<Self, String> {
        let url = Url::parse(broker).map_err(|e| format!("Invalid broker URL: {e}"))?;
        let tls = match url.scheme() {
            "tcp" | "mqtt" => false,
            "ssl" | "tls" | "mqtts" => true,
            other => {
                return Err(format!(
                    "Invalid scheme '{other}'. Must be tcp, mqtt, ssl, tls or mqtts"
                ));
            }
        };

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or("Broker URL must have a host")?;
        let port = url.port().unwrap_or(if tls { 8883 } else { 1883 });

        Ok(Self {
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port,
            tls,
        })
    }
}

/// Publishes `home`/`not_home` with QoS 1 to the expanded topic template.
pub struct MqttNotifier {
    client: AsyncClient,
    topic: String,
    timeout: Duration,
}

impl MqttNotifier {
    /// Build the client and start its connection task. Connecting happens
    /// in the background, so an unreachable broker does not fail startup.
    pub fn connect(config: &MqttConfig) -> Result<Self, MqttSetupError> {
        let broker = BrokerAddress::parse(&config.broker).map_err(MqttSetupError::InvalidBroker)?;

        let mut options = MqttOptions::new(config.client_id.clone(), broker.host, broker.port);
        options.set_keep_alive(KEEP_ALIVE);
        if broker.tls {
            options.set_transport(tls_transport(config)?);
        } else if config.tls_ca_cert.is_some() || config.uses_client_cert() || config.tls_insecure
        {
            warn!(broker = %config.broker, "TLS options are ignored for a plain tcp broker");
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        tokio::spawn(drive_event_loop(eventloop, config.broker.clone()));

        Ok(Self::with_client(
            client,
            config.topic.clone(),
            Duration::from_secs(config.timeout_secs),
        ))
    }

    fn with_client(client: AsyncClient, topic: String, timeout: Duration) -> Self {
        Self { client, topic, timeout }
    }

    fn topic_for(&self, name: &str) -> String {
        self.topic.replace(NAME_PLACEHOLDER, name)
    }
}

#[async_trait]
impl Notifier for MqttNotifier {
    async fn notify(&self, target: &str, signal: Signal) -> Result<(), NotifyError> {
        let publish =
            self.client.publish(self.topic_for(target), QoS::AtLeastOnce, false, signal.as_str());

        match tokio::time::timeout(self.timeout, publish).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(NotifyError::transport(err)),
            Err(_) => Err(NotifyError::Timeout(self.timeout)),
        }
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, MqttSetupError> {
    fs::read(path).map_err(|source| MqttSetupError::ReadFile { path: path.to_path_buf(), source })
}

fn tls_transport(config: &MqttConfig) -> Result<Transport, MqttSetupError> {
    if config.tls_insecure {
        let client_config = rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(insecure::AcceptAnyCert))
            .with_no_client_auth();
        return Ok(Transport::tls_with_config(TlsConfiguration::Rustls(Arc::new(client_config))));
    }

    let Some(ca_path) = &config.tls_ca_cert else {
        return Ok(Transport::tls_with_default_config());
    };

    let ca = read_file(ca_path)?;
    let client_auth = match (&config.tls_client_cert, &config.tls_client_key) {
        (Some(cert), Some(key)) => Some((read_file(cert)?, read_file(key)?)),
        _ => None,
    };

    Ok(Transport::tls_with_config(TlsConfiguration::Simple { ca, alpn: None, client_auth }))
}

/// Connection bookkeeping for the event loop, mirrored into gauges
#[derive(Debug, Default)]
struct ConnectionState {
    connected: bool,
}

impl ConnectionState {
    fn on_connected(&mut self) {
        if !self.connected {
            gauge!(MQTT_BROKERS_CONNECTED).increment(1.0);
        }
        self.connected = true;
    }

    /// Returns whether an established connection was lost
    fn on_error(&mut self) -> bool {
        let was_connected = self.connected;
        if was_connected {
            counter!(MQTT_CONNECTIONS_LOST).increment(1);
            gauge!(MQTT_BROKERS_CONNECTED).decrement(1.0);
        }
        self.connected = false;
        was_connected
    }

    fn on_reconnect(&mut self) {
        counter!(MQTT_RECONNECTIONS).increment(1);
    }
}

fn next_delay(current: Duration) -> Duration {
    (current * 2).min(MAX_RECONNECT_DELAY)
}

async fn drive_event_loop(mut eventloop: EventLoop, broker: String) {
    let mut state = ConnectionState::default();
    let mut delay = MIN_RECONNECT_DELAY;

    info!(%broker, "connecting to MQTT broker");
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                state.on_connected();
                delay = MIN_RECONNECT_DELAY;
                info!(%broker, "connected to MQTT broker");
            }
            Ok(Event::Incoming(Packet::PubAck(ack))) => {
                trace!(pkid = ack.pkid, "publish acknowledged");
            }
            Ok(_) => {}
            Err(ConnectionError::RequestsDone) => {
                debug!(%broker, "MQTT client dropped, stopping event loop");
                break;
            }
            Err(err) => {
                if state.on_error() {
                    warn!(%broker, error = %err, "connection to MQTT broker lost");
                } else {
                    warn!(
                        %broker,
                        error = %err,
                        retry_in_secs = delay.as_secs(),
                        "could not connect to MQTT broker, retrying in background"
                    );
                }

                tokio::time::sleep(delay).await;
                delay = next_delay(delay);
                state.on_reconnect();
                info!(%broker, "reconnecting to MQTT broker");
            }
        }
    }
}

mod insecure {
    use rustls::{
        DigitallySignedStruct, Error, SignatureScheme,
        client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
        pki_types::{CertificateDer, ServerName, UnixTime},
    };

    /// Verifier for `tls_insecure`: every broker certificate is accepted
    #[derive(Debug)]
    pub(super) struct AcceptAnyCert;

    impl ServerCertVerifier for AcceptAnyCert {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            vec![
                SignatureScheme::ECDSA_NISTP256_SHA256,
                SignatureScheme::ECDSA_NISTP384_SHA384,
                SignatureScheme::ED25519,
                SignatureScheme::RSA_PSS_SHA256,
                SignatureScheme::RSA_PSS_SHA384,
                SignatureScheme::RSA_PSS_SHA512,
                SignatureScheme::RSA_PKCS1_SHA256,
                SignatureScheme::RSA_PKCS1_SHA384,
                SignatureScheme::RSA_PKCS1_SHA512,
            ]
        }
    }
}
