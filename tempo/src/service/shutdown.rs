use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::Config;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Finished on its own within the deadline.
    Graceful,
    /// Abandoned after the deadline.
    Forced,
    /// Stopped with an error or panic.
    Crashed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShutdownReport {
    pub eviction: ShutdownOutcome,
    pub http: ShutdownOutcome,
}

/// Drains background work and the HTTP listener on termination.
///
/// Two tokens are handed out. `token` stops the eviction loop and background
/// cleanups, `http_token` starts the listener's graceful shutdown. The second
/// is only cancelled once the eviction loop has stopped, so a cycle that
/// deletes through the relay's own HTTP surface can still finish.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    http_token: CancellationToken,
    tasks: TaskTracker,
    eviction_grace: Duration,
    http_timeout: Duration,
    http_warning: Duration,
}

impl ShutdownCoordinator {
    pub fn new(token: CancellationToken, tasks: TaskTracker, config: &Config) -> Self {
        Self {
            token,
            http_token: CancellationToken::new(),
            tasks,
            eviction_grace: config.eviction_grace,
            http_timeout: config.shutdown_timeout,
            http_warning: config.shutdown_warning,
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn http_token(&self) -> CancellationToken {
        self.http_token.clone()
    }

    /// Waits for `signal` (or an earlier cancellation / server exit), then drains.
    pub async fn run<F>(
        self,
        signal: F,
        scheduler: JoinHandle<()>,
        mut server: JoinHandle<io::Result<()>>,
    ) -> ShutdownReport
    where
        F: Future<Output = ()>,
    {
        let server_exited = tokio::select! {
            _ = signal => {
                tracing::info!("Shutting down server...");
                None
            }
            _ = self.token.cancelled() => {
                tracing::info!("Shutdown requested");
                None
            }
            joined = &mut server => Some(joined),
        };

        self.token.cancel();
        let eviction = self.drain_scheduler(scheduler).await;

        let http = match server_exited {
            Some(joined) => {
                tracing::error!("HTTP server stopped unexpectedly: {:?}", joined);
                ShutdownOutcome::Crashed
            }
            None => self.drain_server(server).await,
        };

        self.tasks.close();
        if timeout(self.http_timeout, self.tasks.wait()).await.is_err() {
            tracing::warn!("{} background tasks still running at exit", self.tasks.len());
        }

        ShutdownReport { eviction, http }
    }

    async fn drain_scheduler(&self, mut scheduler: JoinHandle<()>) -> ShutdownOutcome {
        match timeout(self.eviction_grace, &mut scheduler).await {
            Ok(Ok(())) => ShutdownOutcome::Graceful,
            Ok(Err(err)) => {
                tracing::error!("Auto-cleanup task failed: {err}");
                ShutdownOutcome::Crashed
            }
            Err(_) => {
                tracing::warn!(
                    "Auto-cleanup cycle still running after {:?}, abandoning it",
                    self.eviction_grace
                );
                scheduler.abort();
                ShutdownOutcome::Forced
            }
        }
    }

    async fn drain_server(&self, mut server: JoinHandle<io::Result<()>>) -> ShutdownOutcome {
        self.http_token.cancel();

        let warn_after = self.http_warning;
        let warning = async {
            tokio::time::sleep(warn_after).await;
            tracing::warn!("Warning: Server shutdown is taking longer than expected");
            std::future::pending::<()>().await
        };

        let outcome = tokio::select! {
            joined = timeout(self.http_timeout, &mut server) => joined,
            _ = warning => unreachable!("warning future never completes"),
        };

        match outcome {
            Ok(Ok(Ok(()))) => {
                tracing::info!("Server shut down gracefully");
                ShutdownOutcome::Graceful
            }
            Ok(Ok(Err(err))) => {
                tracing::error!("Server shutdown error: {err}");
                ShutdownOutcome::Crashed
            }
            Ok(Err(err)) => {
                tracing::error!("Server task failed: {err}");
                ShutdownOutcome::Crashed
            }
            Err(_) => {
                server.abort();
                tracing::warn!("Server closed forcefully");
                ShutdownOutcome::Forced
            }
        }
    }
}
