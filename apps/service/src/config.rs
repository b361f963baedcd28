use std::{collections::HashSet, env, fmt, fs, io, net::SocketAddr, path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation;

pub const DEFAULT_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_METRICS_ADDR: &str = "127.0.0.1:9224";
pub const DEFAULT_MQTT_CLIENT_ID: &str = "vicinity";
pub const DEFAULT_MQTT_TOPIC: &str = "vicinity/presence/{name}";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    ReadFailed {
        path: path::PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not write config file {path}: {source}")]
    WriteFailed {
        path: path::PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("could not serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("config file {0} already exists")]
    AlreadyExists(path::PathBuf),
    #[error("no config path available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between two ticks
    pub interval_secs: u64,
    /// Send `not_home` for targets whose probe failed
    pub notify_on_probe_error: bool,
    pub metrics: MetricsConfig,
    pub ping: PingConfig,
    pub notifier: NotifierConfig,
    pub probes: Vec<ProbeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub addr: String,
}

/// Options shared by every `ping` probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingConfig {
    pub count: u32,
    pub timeout_secs: u64,
    /// Binary invoked to send the echo requests
    pub binary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    #[default]
    Ping,
    Tcp,
    Http,
}

impl ProbeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProbeKind::Ping => "ping",
            ProbeKind::Tcp => "tcp",
            ProbeKind::Http => "http",
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub name: String,
    #[serde(default)]
    pub kind: ProbeKind,
    pub target: String,
    /// Overrides the kind's default timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Overrides `ping.count` for this probe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NotifierConfig {
    Webhook(WebhookConfig),
    Mqtt(MqttConfig),
    #[default]
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookMethod {
    #[default]
    Post,
    Put,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    /// The bare signal as `text/plain`
    #[default]
    Plain,
    /// `{"name": ..., "state": ...}`
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Request URL, `{name}` is replaced by the target name
    pub url: String,
    #[serde(default)]
    pub method: WebhookMethod,
    #[serde(default)]
    pub payload: PayloadFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,
}

/// MQTT broker connection, signals are published with QoS 1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// `tcp://host:1883` or `ssl://host:8883` (`mqtt`/`mqtts`/`tls` also work)
    pub broker: String,
    #[serde(default = "default_mqtt_client_id")]
    pub client_id: String,
    /// Topic template, `{name}` is replaced by the target name
    #[serde(default = "default_mqtt_topic")]
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert: Option<path::PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_client_cert: Option<path::PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_client_key: Option<path::PathBuf>,
    /// Accept any broker certificate
    #[serde(default)]
    pub tls_insecure: bool,
    /// How long a publish may wait for room in the outgoing queue
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,
}

impl MqttConfig {
    pub fn uses_client_cert(&self) -> bool {
        self.tls_client_cert.is_some() && self.tls_client_key.is_some()
    }
}

fn default_mqtt_client_id() -> String {
    DEFAULT_MQTT_CLIENT_ID.into()
}

fn default_mqtt_topic() -> String {
    DEFAULT_MQTT_TOPIC.into()
}

fn default_probe_timeout_secs() -> u64 {
    DEFAULT_PROBE_TIMEOUT_SECS
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/vicinity/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("vicinity/config.toml"))
}

/// Resolve the config path from the command line or the default location
pub fn resolve_config_path(
    optional_path: Option<impl AsRef<path::Path>>,
) -> Result<path::PathBuf, ConfigError> {
    match optional_path {
        Some(path) => Ok(normalize_toml_path(path.as_ref())),
        None => default_config_path(),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            notify_on_probe_error: true,
            metrics: MetricsConfig::default(),
            ping: PingConfig::default(),
            notifier: NotifierConfig::default(),
            probes: Vec::new(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true, addr: DEFAULT_METRICS_ADDR.into() }
    }
}

impl Default for PingConfig {
    fn default() -> Self {
        Self { count: 3, timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS, binary: "ping".into() }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Configuration:")?;
        write_title_1(f, "Scheduler")?;
        write_1(f, "Interval (s)", &self.interval_secs)?;
        write_1(f, "Notify on probe error", &self.notify_on_probe_error)?;

        write_title_1(f, "Metrics")?;
        write_1(f, "Enabled", &self.metrics.enabled)?;
        write_1(f, "Address", &self.metrics.addr)?;

        write_title_1(f, "Notifier")?;
        match &self.notifier {
            NotifierConfig::Log => write_1(f, "Kind", &"log")?,
            NotifierConfig::Mqtt(mqtt) => {
                write_1(f, "Kind", &"mqtt")?;
                write_1(f, "Broker", &mqtt.broker)?;
                write_1(f, "Client ID", &mqtt.client_id)?;
                write_1(f, "Topic", &mqtt.topic)?;
                if let Some(ca) = &mqtt.tls_ca_cert {
                    write_1(f, "CA cert", &ca.display())?;
                }
                if let (Some(cert), Some(key)) = (&mqtt.tls_client_cert, &mqtt.tls_client_key) {
                    write_1(f, "Client cert", &cert.display())?;
                    write_1(f, "Client key", &key.display())?;
                }
                if mqtt.tls_insecure {
                    write_1(f, "TLS verification", &"disabled")?;
                }
            }
            NotifierConfig::Webhook(webhook) => {
                write_1(f, "Kind", &"webhook")?;
                write_1(f, "URL", &webhook.url)?;
                write_1(f, "Method", &format_args!("{:?}", webhook.method))?;
                write_1(f, "Payload", &format_args!("{:?}", webhook.payload))?;
                write_1(f, "Token", &if webhook.token.is_some() { "<set>" } else { "<none>" })?;
            }
        }

        write_title_1(f, "Probes")?;
        for probe in &self.probes {
            write_1(f, &probe.name, &format_args!("{} {}", probe.kind, probe.target))?;
            if let Some(timeout) = probe.timeout_secs {
                write_2(f, "Timeout (s)", &timeout)?;
            }
        }

        Ok(())
    }
}

impl Config {
    /// Load, parse and validate the config file
    ///
    /// Reads from the given path (a `.toml` extension is enforced) or from
    /// ~/.config/vicinity/config.toml. A missing file is an error.
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path = resolve_config_path(optional_path)?;

        let raw_string = fs::read_to_string(&config_path)
            .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
        Self::from_toml_str(&raw_string)
    }

    /// Parse and validate a config from TOML text
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_interval(self.interval_secs).map_err(ConfigError::Invalid)?;
        validation::validate_timeout(self.ping.timeout_secs)
            .map_err(|e| ConfigError::Invalid(format!("ping: {e}")))?;
        if self.ping.count == 0 {
            return Err(ConfigError::Invalid("ping: count must be at least 1".into()));
        }

        if self.metrics.enabled {
            self.metrics_addr()?;
        }

        if let NotifierConfig::Webhook(webhook) = &self.notifier {
            validation::validate_webhook_url(&webhook.url)
                .map_err(|e| ConfigError::Invalid(format!("notifier: {e}")))?;
            validation::validate_timeout(webhook.timeout_secs)
                .map_err(|e| ConfigError::Invalid(format!("notifier: {e}")))?;
        }

        if let NotifierConfig::Mqtt(mqtt) = &self.notifier {
            validation::validate_mqtt_broker(&mqtt.broker)
                .map_err(|e| ConfigError::Invalid(format!("notifier: {e}")))?;
            validation::validate_mqtt_topic(&mqtt.topic)
                .map_err(|e| ConfigError::Invalid(format!("notifier: {e}")))?;
            validation::validate_timeout(mqtt.timeout_secs)
                .map_err(|e| ConfigError::Invalid(format!("notifier: {e}")))?;
            if mqtt.client_id.trim().is_empty() {
                return Err(ConfigError::Invalid("notifier: client_id cannot be empty".into()));
            }
            if mqtt.tls_client_cert.is_some() != mqtt.tls_client_key.is_some() {
                return Err(ConfigError::Invalid(
                    "notifier: tls_client_cert and tls_client_key must be set together".into(),
                ));
            }
            if mqtt.uses_client_cert() && mqtt.tls_ca_cert.is_none() {
                return Err(ConfigError::Invalid(
                    "notifier: a client certificate needs tls_ca_cert".into(),
                ));
            }
            if mqtt.tls_insecure && (mqtt.tls_ca_cert.is_some() || mqtt.uses_client_cert()) {
                return Err(ConfigError::Invalid(
                    "notifier: tls_insecure cannot be combined with certificate files".into(),
                ));
            }
        }

        let mut names = HashSet::new();
        for probe in &self.probes {
            validation::validate_probe_name(&probe.name).map_err(ConfigError::Invalid)?;
            if matches!(self.notifier, NotifierConfig::Mqtt(_)) {
                validation::validate_topic_name(&probe.name).map_err(|e| {
                    ConfigError::Invalid(format!("probe '{}': {e}", probe.name))
                })?;
            }
            if !names.insert(probe.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "probe '{}' is defined more than once",
                    probe.name
                )));
            }
            validation::validate_probe_target(probe.kind, &probe.target)
                .map_err(|e| ConfigError::Invalid(format!("probe '{}': {e}", probe.name)))?;
            if let Some(timeout) = probe.timeout_secs {
                validation::validate_timeout(timeout)
                    .map_err(|e| ConfigError::Invalid(format!("probe '{}': {e}", probe.name)))?;
            }
            if probe.count == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "probe '{}': count must be at least 1",
                    probe.name
                )));
            }
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn metrics_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.metrics.addr.parse().map_err(|e| {
            ConfigError::Invalid(format!("metrics: invalid address '{}': {e}", self.metrics.addr))
        })
    }

    /// Minimal config written by `--init`
    pub fn example() -> Self {
        Self {
            probes: vec![ProbeConfig {
                name: "phone".into(),
                kind: ProbeKind::Ping,
                target: "192.168.1.20".into(),
                timeout_secs: None,
                count: None,
            }],
            ..Self::default()
        }
    }

    /// Serialize and write a config to a file, refusing to overwrite one
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }

        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })
    }
}

impl ProbeConfig {
    /// Timeout for this probe, falling back to `default`
    pub fn timeout(&self, default_secs: u64) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(default_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r#"
interval_secs = 15
notify_on_probe_error = false

[metrics]
addr = "0.0.0.0:9300"

[ping]
count = 2
timeout_secs = 3

[notifier]
kind = "webhook"
url = "http://hass.local:8123/api/presence/{name}"
method = "put"
payload = "json"
token = "secret"

[[probes]]
name = "phone"
target = "192.168.1.20"

[[probes]]
name = "nas"
kind = "tcp"
target = "nas.local:445"
timeout_secs = 2

[[probes]]
name = "printer"
kind = "http"
target = "http://printer.local/"
"#;

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml_str(FULL_CONFIG).unwrap();

        assert_eq!(config.interval(), Duration::from_secs(15));
        assert!(!config.notify_on_probe_error);
        assert_eq!(config.metrics_addr().unwrap().port(), 9300);
        assert_eq!(config.ping.count, 2);
        assert_eq!(config.ping.binary, "ping");
        assert_eq!(config.probes.len(), 3);
        assert_eq!(config.probes[0].kind, ProbeKind::Ping);
        assert_eq!(config.probes[1].kind, ProbeKind::Tcp);
        assert_eq!(config.probes[1].timeout(10), Duration::from_secs(2));
        assert_eq!(config.probes[2].timeout(10), Duration::from_secs(10));

        let NotifierConfig::Webhook(webhook) = &config.notifier else {
            panic!("expected webhook notifier");
        };
        assert_eq!(webhook.method, WebhookMethod::Put);
        assert_eq!(webhook.payload, PayloadFormat::Json);
        assert_eq!(webhook.timeout_secs, DEFAULT_PROBE_TIMEOUT_SECS);
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str("").unwrap();

        assert_eq!(config.interval_secs, DEFAULT_INTERVAL_SECS);
        assert!(config.notify_on_probe_error);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.addr, DEFAULT_METRICS_ADDR);
        assert_eq!(config.notifier, NotifierConfig::Log);
        assert!(config.probes.is_empty());
    }

    #[test]
    fn test_duplicate_probe_names_rejected() {
        let raw = r#"
[[probes]]
name = "phone"
target = "10.0.0.2"

[[probes]]
name = "phone"
target = "10.0.0.3"
"#;
        let err = Config::from_toml_str(raw).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("more than once")));
    }

    #[test]
    fn test_invalid_targets_rejected() {
        let raw = r#"
[[probes]]
name = "nas"
kind = "tcp"
target = "nas.local"
"#;
        assert!(matches!(Config::from_toml_str(raw), Err(ConfigError::Invalid(_))));

        let raw = r#"
[notifier]
kind = "webhook"
url = "mqtt://broker/{name}"
"#;
        assert!(matches!(Config::from_toml_str(raw), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(matches!(Config::from_toml_str("interval_secs = 0"), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_probe_kind_is_a_parse_error() {
        let raw = r#"
[[probes]]
name = "phone"
kind = "arp"
target = "10.0.0.2"
"#;
        assert!(matches!(Config::from_toml_str(raw), Err(ConfigError::ParseFailed(_))));
    }

    #[test]
    fn test_display_hides_token() {
        let config = Config::from_toml_str(FULL_CONFIG).unwrap();
        let rendered = config.to_string();

        assert!(rendered.contains("phone"));
        assert!(rendered.contains("<set>"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_write_then_load_example() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        Config::example().write_config(&path).unwrap();
        let loaded = Config::from_config(Some(&path)).unwrap();

        assert_eq!(loaded.probes, Config::example().probes);
        assert!(matches!(
            Config::example().write_config(&path),
            Err(ConfigError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_config(Some(dir.path().join("absent"))).unwrap_err();

        assert!(matches!(err, ConfigError::ReadFailed { ref path, .. } if path.ends_with("absent.toml")));
    }

    #[test]
    fn test_normalize_toml_path() {
        assert_eq!(
            normalize_toml_path(path::Path::new("/etc/vicinity")),
            path::PathBuf::from("/etc/vicinity.toml")
        );
        assert_eq!(
            normalize_toml_path(path::Path::new("/etc/vicinity.toml")),
            path::PathBuf::from("/etc/vicinity.toml")
        );
    }

    #[test]
    fn test_parse_mqtt_notifier() {
        let raw = r#"
[notifier]
kind = "mqtt"
broker = "ssl://broker.local:8883"
topic = "home/presence/{name}"
tls_ca_cert = "/etc/vicinity/ca.pem"
tls_client_cert = "/etc/vicinity/client.pem"
tls_client_key = "/etc/vicinity/client.key"

[[probes]]
name = "phone"
target = "192.168.1.20"
"#;
        let config = Config::from_toml_str(raw).unwrap();

        let NotifierConfig::Mqtt(mqtt) = &config.notifier else {
            panic!("expected mqtt notifier");
        };
        assert_eq!(mqtt.client_id, DEFAULT_MQTT_CLIENT_ID);
        assert_eq!(mqtt.topic, "home/presence/{name}");
        assert!(mqtt.uses_client_cert());
        assert!(!mqtt.tls_insecure);
        assert_eq!(mqtt.timeout_secs, DEFAULT_PROBE_TIMEOUT_SECS);
        assert!(config.to_string().contains("ca.pem"));
    }

    #[test]
    fn test_mqtt_rejects_wildcards_in_names() {
        let raw = r#"
[notifier]
kind = "mqtt"
broker = "tcp://broker.local:1883"

[[probes]]
name = "kids/tablet"
target = "192.168.1.21"
"#;
        assert!(matches!(Config::from_toml_str(raw), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_mqtt_tls_options_are_checked() {
        let half_pair = r#"
[notifier]
kind = "mqtt"
broker = "ssl://broker.local"
tls_client_cert = "/etc/vicinity/client.pem"
"#;
        assert!(matches!(Config::from_toml_str(half_pair), Err(ConfigError::Invalid(_))));

        let insecure_with_ca = r#"
[notifier]
kind = "mqtt"
broker = "ssl://broker.local"
tls_ca_cert = "/etc/vicinity/ca.pem"
tls_insecure = true
"#;
        assert!(matches!(Config::from_toml_str(insecure_with_ca), Err(ConfigError::Invalid(_))));

        let topic_without_name = r#"
[notifier]
kind = "mqtt"
broker = "tcp://broker.local"
topic = "home/presence"
"#;
        assert!(matches!(Config::from_toml_str(topic_without_name), Err(ConfigError::Invalid(_))));
    }
}
