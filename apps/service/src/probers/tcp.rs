use std::{io::ErrorKind, time::Duration};

use async_trait::async_trait;
use tokio::{net::TcpStream, time::timeout};
use tracing::debug;
use vicinity::{ProbeError, Prober};

/// TCP port probe
///
/// A completed handshake or an explicit refusal both prove the host is on
/// the network; only silence until the timeout counts as absent.
pub struct TcpProber {
    target: String,
    timeout_duration: Duration,
}

impl TcpProber {
    pub fn new(target: impl Into<String>, timeout_duration: Duration) -> Self {
        Self { target: target.into(), timeout_duration }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn check(&self) -> Result<bool, ProbeError> {
        let connect = TcpStream::connect(&self.target);

        match timeout(self.timeout_duration, connect).await {
            Ok(Ok(_stream)) => Ok(true),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                debug!(address = %self.target, "connection refused, host is up");
                Ok(true)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                debug!(address = %self.target, "TCP connection timeout");
                Ok(false)
            }
        }
    }
}
