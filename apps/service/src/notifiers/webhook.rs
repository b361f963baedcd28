use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Method, Url, header};
use serde::Serialize;
use vicinity::{Notifier, NotifyError, Signal};

use crate::config::{PayloadFormat, WebhookConfig, WebhookMethod};

const NAME_PLACEHOLDER: &str = "{name}";

/// Everything except RFC 3986 unreserved characters, so a name always stays
/// inside the segment or query value it was placed in
const NAME_ENCODE_SET: &AsciiSet =
    &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

#[derive(Serialize)]
struct JsonPayload<'a> {
    name: &'a str,
    state: &'a str,
}

/// Delivers signals as HTTP requests, one per target and tick.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url_template: String,
    method: Method,
    payload: PayloadFormat,
    token: Option<String>,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let method = match config.method {
            WebhookMethod::Post => Method::POST,
            WebhookMethod::Put => Method::PUT,
        };

        Ok(Self {
            client,
            url_template: config.url.clone(),
            method,
            payload: config.payload,
            token: config.token.clone(),
            timeout,
        })
    }

    /// Expand the URL template for one target, percent-encoding the name.
    fn url_for(&self, name: &str) -> Result<Url, NotifyError> {
        let encoded = utf8_percent_encode(name, NAME_ENCODE_SET).to_string();
        Url::parse(&self.url_template.replace(NAME_PLACEHOLDER, &encoded))
            .map_err(NotifyError::transport)
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, target: &str, signal: Signal) -> Result<(), NotifyError> {
        let mut request = self.client.request(self.method.clone(), self.url_for(target)?);

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request = match self.payload {
            PayloadFormat::Plain => request
                .header(header::CONTENT_TYPE, "text/plain")
                .body(signal.as_str()),
            PayloadFormat::Json => {
                request.json(&JsonPayload { name: target, state: signal.as_str() })
            }
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() { NotifyError::Timeout(self.timeout) } else { NotifyError::transport(e) }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected { status: status.as_u16() });
        }

        Ok(())
    }
}
