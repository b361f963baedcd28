use async_trait::async_trait;
use tracing::info;
use vicinity::{Notifier, NotifyError, Signal};

/// Writes every signal to the log instead of delivering it anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, target: &str, signal: Signal) -> Result<(), NotifyError> {
        info!(name = target, %signal, "presence update");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        assert!(LogNotifier.notify("phone", Signal::Home).await.is_ok());
        assert!(LogNotifier.notify("phone", Signal::NotHome).await.is_ok());
    }
}
