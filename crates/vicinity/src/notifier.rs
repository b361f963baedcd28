use async_trait::async_trait;

use crate::{error::NotifyError, signal::Signal};

/// Delivers presence signals to an external system.
///
/// Implementations are shared by every probe of a tick and must tolerate
/// concurrent calls. Retries and reconnects, if any, happen inside
/// `notify`; the caller treats each call as a single attempt.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, target: &str, signal: Signal) -> Result<(), NotifyError>;
}
