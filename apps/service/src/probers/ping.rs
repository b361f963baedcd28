use std::{process::Stdio, time::Duration};

use async_trait::async_trait;
use tokio::{process::Command, time::timeout};
use tracing::debug;
use vicinity::{ProbeError, Prober};

use crate::config::PingConfig;

/// Extra time granted to the ping binary on top of its own deadline
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// ICMP echo probe backed by the system `ping` binary.
///
/// Using the setuid/capability-enabled binary avoids needing raw socket
/// privileges in this process. Exit status 0 means at least one reply was
/// received, 1 means none was.
pub struct PingProber {
    binary: String,
    target: String,
    count: u32,
    timeout: Duration,
}

impl PingProber {
    pub fn new(target: impl Into<String>, count: u32, timeout: Duration, config: &PingConfig) -> Self {
        Self { binary: config.binary.clone(), target: target.into(), count: count.max(1), timeout }
    }

    /// Upper bound for the whole run: one second between echo requests plus
    /// the reply timeout of the last one.
    fn deadline(&self) -> Duration {
        Duration::from_secs(u64::from(self.count.saturating_sub(1))) + self.timeout + EXIT_GRACE
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("-c")
            .arg(self.count.to_string())
            .arg("-W")
            .arg(self.timeout.as_secs().max(1).to_string())
            .arg("-q")
            .arg(&self.target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Prober for PingProber {
    async fn check(&self) -> Result<bool, ProbeError> {
        let deadline = self.deadline();
        let output = timeout(deadline, self.command().output())
            .await
            .map_err(|_| ProbeError::Timeout(deadline))??;

        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => {
                debug!(host = %self.target, "no echo reply received");
                Ok(false)
            }
            code => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(ProbeError::other(format!(
                    "{} exited with {}: {}",
                    self.binary,
                    code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}")),
                    stderr.trim()
                )))
            }
        }
    }
}
