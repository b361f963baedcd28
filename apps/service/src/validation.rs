use std::net::IpAddr;

use url::Url;

use crate::{config::ProbeKind, notifiers::mqtt::BrokerAddress};

/// Validate HTTP/HTTPS URL endpoint
pub fn validate_http_target(target: &str) -> Result<(), String> {
    if target.trim().is_empty() {
        return Err("Target cannot be empty".into());
    }

    match Url::parse(target) {
        Ok(url) => {
            let scheme = url.scheme();
            if scheme != "http" && scheme != "https" {
                return Err(format!("Invalid scheme '{scheme}'. Must be http or https"));
            }

            if url.host_str().is_none() {
                return Err("URL must have a valid host".into());
            }

            Ok(())
        }
        Err(e) => {
            // If it fails to parse, check if it's missing a scheme
            if !target.contains("://") {
                Err("URL must include scheme (http:// or https://)".into())
            } else {
                Err(format!("Invalid URL: {e}"))
            }
        }
    }
}

/// Validate a webhook URL template, `{name}` placeholders included
pub fn validate_webhook_url(template: &str) -> Result<(), String> {
    validate_http_target(&template.replace("{name}", "probe"))
}

/// Validate an MQTT broker URL such as `tcp://host:1883`
pub fn validate_mqtt_broker(broker: &str) -> Result<(), String> {
    if broker.trim().is_empty() {
        return Err("Broker cannot be empty".into());
    }

    BrokerAddress::parse(broker).map(|_| ())
}

/// Validate an MQTT topic template, it must contain `{name}`
pub fn validate_mqtt_topic(template: &str) -> Result<(), String> {
    if !template.contains("{name}") {
        return Err("Topic must contain '{name}' so every target gets its own topic".into());
    }

    if template.contains(['+', '#']) {
        return Err("Topic cannot contain wildcards".into());
    }

    Ok(())
}

/// Validate a probe name used as an MQTT topic level
pub fn validate_topic_name(name: &str) -> Result<(), String> {
    if name.contains(['/', '+', '#']) {
        return Err("Name cannot contain '/', '+' or '#' when publishing to MQTT".into());
    }

    Ok(())
}

/// Validate TCP endpoint (host:port or [v6]:port), without resolving it
pub fn validate_tcp_target(target: &str) -> Result<(), String> {
    if target.trim().is_empty() {
        return Err("Target cannot be empty".into());
    }

    let Some((host, port)) = target.rsplit_once(':') else {
        return Err("TCP target must be in format 'host:port'".into());
    };

    match host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        Some(v6) => {
            if v6.parse::<IpAddr>().is_err() {
                return Err(format!("Invalid IPv6 address '{v6}'"));
            }
        }
        None if host.is_empty() => {
            return Err("TCP target must be in format 'host:port'".into());
        }
        None if host.contains(':') => {
            return Err("IPv6 targets must be written as '[address]:port'".into());
        }
        None => validate_host(host)?,
    }

    match port.parse::<u16>() {
        Ok(port) if port > 0 => Ok(()),
        Ok(_) => Err("Port must be between 1 and 65535".into()),
        Err(_) => Err("Invalid port number".into()),
    }
}

/// Validate ping endpoint (IP address or hostname)
pub fn validate_ping_target(target: &str) -> Result<(), String> {
    if target.trim().is_empty() {
        return Err("Target cannot be empty".into());
    }

    validate_host(target)
}

fn validate_host(host: &str) -> Result<(), String> {
    if host.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    if host.contains(' ') {
        return Err("Target cannot contain spaces".into());
    }

    // A leading hyphen would be read as a flag by the ping binary
    if host.starts_with('-') || host.ends_with('-') {
        return Err("Hostname cannot start or end with hyphen".into());
    }

    if host.chars().all(|c| c.is_alphanumeric() || c == '.' || c == '-') {
        Ok(())
    } else {
        Err("Invalid hostname. Use IP address or valid hostname".into())
    }
}

/// Validate probe target based on probe kind
pub fn validate_probe_target(kind: ProbeKind, target: &str) -> Result<(), String> {
    match kind {
        ProbeKind::Ping => validate_ping_target(target),
        ProbeKind::Tcp => validate_tcp_target(target),
        ProbeKind::Http => validate_http_target(target),
    }
}

/// Validate probe name
pub fn validate_probe_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err("Probe name cannot be empty".into());
    }

    if trimmed.len() > 100 {
        return Err("Probe name too long (max 100 characters)".into());
    }

    Ok(())
}

/// Validate tick interval
pub fn validate_interval(interval: u64) -> Result<(), String> {
    if interval == 0 {
        return Err("Interval must be at least 1 second".into());
    }

    if interval > 86400 {
        return Err("Interval too long (max 24 hours)".into());
    }

    Ok(())
}

/// Validate a probe or notifier timeout
pub fn validate_timeout(timeout: u64) -> Result<(), String> {
    if timeout == 0 {
        return Err("Timeout must be at least 1 second".into());
    }

    if timeout > 300 {
        return Err("Timeout too long (max 5 minutes)".into());
    }

    Ok(())
}
