//! Saves pending time when asked to, so totals read by the cli include time the daemon hasn't
//! flushed on its own yet. On unix the cli asks by sending `SIGUSR1` to the daemon.

use std::sync::Arc;

use anyhow::Result;
use tokio::{select, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{processing::accumulator::Accumulator, storage::usage_store::UsageStore};

/// Requests arriving while a flush runs are merged into a single follow-up flush.
pub const FLUSH_REQUEST_CAPACITY: usize = 1;

pub struct FlushModule<S> {
    accumulator: Arc<Accumulator<S>>,
    requests: mpsc::Receiver<()>,
    shutdown: CancellationToken,
}

impl<S: UsageStore + Send + Sync + 'static> FlushModule<S> {
    pub fn new(
        accumulator: Arc<Accumulator<S>>,
        requests: mpsc::Receiver<()>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            accumulator,
            requests,
            shutdown,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        info!("Flush request loop started");
        loop {
            select! {
                _ = self.shutdown.cancelled() => {
                    info!("Flush request loop ended");
                    return Ok(())
                }
                request = self.requests.recv() => match request {
                    Some(()) => {
                        info!("Flush requested");
                        self.accumulator.force_save().await.log();
                    }
                    None => {
                        debug!("Flush requests closed");
                        self.shutdown.cancelled().await;
                        return Ok(())
                    }
                }
            }
        }
    }
}

/// Turns every `SIGUSR1` into a flush request. The handler is installed before this returns, so
/// signals sent afterwards are never lost.
#[cfg(unix)]
pub fn forward_flush_signals(
    requests: mpsc::Sender<()>,
    shutdown: CancellationToken,
) -> Result<impl std::future::Future<Output = Result<()>> + Send + 'static> {
    use anyhow::Context;
    use tokio::{
        signal::unix::{signal, SignalKind},
        sync::mpsc::error::TrySendError,
    };

    let mut user_signal =
        signal(SignalKind::user_defined1()).context("Failed to listen for SIGUSR1")?;
    Ok(async move {
        loop {
            select! {
                _ = shutdown.cancelled() => return Ok(()),
                received = user_signal.recv() => {
                    if received.is_none() {
                        return Ok(());
                    }
                    // A full channel already holds a request that hasn't been served.
                    if let Err(TrySendError::Closed(())) = requests.try_send(()) {
                        return Ok(());
                    }
                }
            }
        }
    })
}
