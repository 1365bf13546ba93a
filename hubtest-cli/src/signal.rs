//! Operator interrupt handling.
//!
//! SIGINT/SIGTERM do not kill the launcher outright: the first one cancels
//! the run's stop token, the launcher stops waiting on `up`, and teardown
//! still runs before the process exits. A second one cancels the abort token,
//! which abandons a teardown that is stuck.

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Installed SIGTERM/SIGINT handlers.
///
/// Once installed, these signals no longer terminate the process; they are
/// queued until [`ShutdownSignals::recv`] picks them up.
#[cfg(unix)]
pub struct ShutdownSignals {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    /// Install the handlers. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if signal handlers cannot be installed.
    pub fn install() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;
        Ok(Self { sigterm, sigint })
    }

    /// Wait for the next signal and return its name.
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

#[cfg(not(unix))]
pub struct ShutdownSignals {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(not(unix))]
impl ShutdownSignals {
    pub fn install() -> Result<Self> {
        let ctrl_c = tokio::signal::windows::ctrl_c()
            .map_err(|e| anyhow::anyhow!("failed to install Ctrl-C handler: {}", e))?;
        Ok(Self { ctrl_c })
    }

    pub async fn recv(&mut self) -> &'static str {
        self.ctrl_c.recv().await;
        "CTRL_C"
    }
}

/// Install signal handlers, then spawn a task that cancels `stop` on the
/// first signal and `abort` on the second.
///
/// Handlers are in place when this returns, so a signal arriving before the
/// task is first polled is not lost. The task resolves to the first signal's
/// name once `abort` is cancelled (by a second signal or by the caller), or to
/// `None` if `stop` was cancelled elsewhere or handlers could not be installed.
pub fn spawn_listener(
    stop: CancellationToken,
    abort: CancellationToken,
) -> JoinHandle<Option<&'static str>> {
    let installed = ShutdownSignals::install();
    tokio::spawn(async move {
        let mut signals = match installed {
            Ok(signals) => signals,
            Err(e) => {
                tracing::error!(error = %e, "signal handling unavailable");
                return None;
            }
        };

        let first = tokio::select! {
            _ = stop.cancelled() => return None,
            name = signals.recv() => name,
        };
        tracing::warn!(signal = first, "interrupt received, stopping run and tearing down");
        stop.cancel();

        tokio::select! {
            _ = abort.cancelled() => {}
            name = signals.recv() => {
                tracing::error!(signal = name, "second interrupt, abandoning teardown");
                abort.cancel();
            }
        }
        Some(first)
    })
}
