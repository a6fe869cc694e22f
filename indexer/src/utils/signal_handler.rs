use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[cfg(unix)]
use signal::unix::{signal, SignalKind};

/// Signal types that can trigger shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM - Docker/Kubernetes graceful shutdown
    Terminate,
    /// SIGINT - Ctrl+C interactive shutdown
    Interrupt,
    /// The root token was cancelled by the application itself
    Internal,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
            ShutdownSignal::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// Turns process signals into cancellation of one root token.
///
/// Live mode checks the token between chunks, so a chunk in flight always finishes.
pub struct SignalHandler {
    root: CancellationToken,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self { root: CancellationToken::new() }
    }

    pub fn token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Spawn the listener. The root token is cancelled on the first signal.
    pub fn spawn(self) -> CancellationToken {
        let token = self.root.clone();
        tokio::spawn(async move {
            let received = self.wait_for_signal().await;
            info!("Received shutdown signal: {}, finishing the current chunk", received);
            self.root.cancel();
        });
        token
    }

    #[cfg(unix)]
    async fn wait_for_signal(&self) -> ShutdownSignal {
        let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Could not install unix signal handlers, falling back to Ctrl+C");
                return self.wait_for_ctrl_c().await;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => ShutdownSignal::Terminate,
            _ = sigint.recv() => ShutdownSignal::Interrupt,
            _ = self.root.cancelled() => ShutdownSignal::Internal,
        }
    }

    #[cfg(not(unix))]
    async fn wait_for_signal(&self) -> ShutdownSignal {
        self.wait_for_ctrl_c().await
    }

    async fn wait_for_ctrl_c(&self) -> ShutdownSignal {
        tokio::select! {
            res = signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!(error = %e, "Ctrl+C handler failed");
                }
                ShutdownSignal::Interrupt
            }
            _ = self.root.cancelled() => ShutdownSignal::Internal,
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}
