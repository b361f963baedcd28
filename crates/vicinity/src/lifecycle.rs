//! Process lifecycle: turns the first OS interrupt into a cancellation.

use std::io;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Owns the process-wide cancellation token.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    token: CancellationToken,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token observed by the scheduler
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token. Returns `false` if shutdown was already requested.
    pub fn request_shutdown(&self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.token.cancel();
        true
    }

    /// Register the interrupt handlers and spawn the listener.
    ///
    /// Handlers are registered before this returns, so an interrupt that
    /// arrives before the listener first runs is still caught. The first
    /// SIGINT (or SIGTERM on unix) cancels the token. Once registered the
    /// runtime keeps swallowing later interrupts, so they have no further
    /// effect.
    pub fn install_signal_handler(&self) -> io::Result<JoinHandle<()>> {
        let mut interrupts = Interrupts::register()?;
        let lifecycle = self.clone();

        Ok(tokio::spawn(async move {
            let signal = interrupts.recv().await;
            if lifecycle.request_shutdown() {
                info!(signal, "Got signal, shutting down after the current tick");
            }
        }))
    }
}

#[cfg(unix)]
struct Interrupts {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Interrupts {
    fn register() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

#[cfg(windows)]
struct Interrupts {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(windows)]
impl Interrupts {
    fn register() -> io::Result<Self> {
        Ok(Self { ctrl_c: tokio::signal::windows::ctrl_c()? })
    }

    async fn recv(&mut self) -> &'static str {
        self.ctrl_c.recv().await;
        "ctrl-c"
    }
}
