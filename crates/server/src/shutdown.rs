//! Stop signals and the bounded drain that follows them.

use std::fmt;
use std::time::Duration;

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Which signal asked the process to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Terminate,
    Interrupt,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Terminate => "SIGTERM",
            Self::Interrupt => "Ctrl+C",
        })
    }
}

/// How the server task ended once a stop was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    Completed,
    TimedOut,
}

/// Cancel `token` on the first stop signal.
pub fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        let reason = stop_requested().await;
        tracing::info!(%reason, "stop requested, draining connections");
        token.cancel();
    });
}

/// Resolves on SIGTERM or Ctrl+C. If SIGTERM cannot be registered only
/// Ctrl+C is watched.
#[cfg(unix)]
async fn stop_requested() -> StopReason {
    use signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => tokio::select! {
            _ = term.recv() => StopReason::Terminate,
            () = interrupt() => StopReason::Interrupt,
        },
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable, watching Ctrl+C only");
            interrupt().await;
            StopReason::Interrupt
        }
    }
}

#[cfg(not(unix))]
async fn stop_requested() -> StopReason {
    interrupt().await;
    StopReason::Interrupt
}

/// Never resolves if Ctrl+C cannot be watched.
async fn interrupt() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::warn!(error = %e, "Ctrl+C handler unavailable");
        std::future::pending::<()>().await;
    }
}

/// Wait up to `limit` for the cancelled server task to finish.
///
/// A server error is returned as-is; running out of time is not an error.
pub async fn drain(
    server: JoinHandle<std::io::Result<()>>,
    limit: Duration,
) -> anyhow::Result<Drain> {
    match tokio::time::timeout(limit, server).await {
        Ok(joined) => {
            joined??;
            Ok(Drain::Completed)
        }
        Err(_) => Ok(Drain::TimedOut),
    }
}
