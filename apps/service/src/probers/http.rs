use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use vicinity::{ProbeError, Prober};

/// HTTP/HTTPS probe
///
/// 2xx and 3xx answers count as present, any other status or a timeout as
/// absent. Other transport failures are probe errors.
pub struct HttpProber {
    client: reqwest::Client,
    url: String,
}

impl HttpProber {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn check(&self) -> Result<bool, ProbeError> {
        let response = match self.client.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                debug!(url = %self.url, "HTTP request timed out");
                return Ok(false);
            }
            Err(e) => return Err(ProbeError::other(e)),
        };

        let status = response.status();
        if status.is_success() || status.is_redirection() {
            Ok(true)
        } else {
            debug!(url = %self.url, status = status.as_u16(), "HTTP check got an error status");
            Ok(false)
        }
    }
}
