use std::{future::Future, time::Duration};

use anyhow::Result;
use tokio::{select, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Detects signals sent to the process, or a cancellation requested from inside the daemon.
///
/// On Windows detached processes can't detect signals sent to them, so `timetrace stop` ends up
/// killing the process and time accumulated since the last flush is lost.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM {e:?}");
                std::future::pending::<()>().await
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt, shutting down");
            cancelation.cancel();
        },
        _ = terminate => {
            info!("Received termination request, shutting down");
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => (),
    };
}

/// A spawned daemon loop that observes a [CancellationToken].
pub struct ModuleHandle {
    name: &'static str,
    shutdown: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl ModuleHandle {
    pub fn spawn(
        name: &'static str,
        shutdown: CancellationToken,
        module: impl Future<Output = Result<()>> + Send + 'static,
    ) -> Self {
        Self {
            name,
            shutdown,
            task: tokio::spawn(module),
        }
    }

    /// Requests cancellation and waits for the loop to notice it. A loop that doesn't finish in
    /// `timeout` is left running detached.
    pub async fn stop(self, timeout: Duration) {
        self.shutdown.cancel();
        match tokio::time::timeout(timeout, self.task).await {
            Ok(Ok(Ok(()))) => info!("{} module stopped", self.name),
            Ok(Ok(Err(e))) => error!("{} module got an error {e:?}", self.name),
            Ok(Err(e)) => error!("{} module panicked or was aborted {e:?}", self.name),
            Err(_) => warn!("{} module didn't stop in {timeout:?}", self.name),
        }
    }
}
