use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{anyhow, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, Instrument};

use crate::{
    daemon::{
        processing::accumulator::{Accumulator, FlushReport},
        shutdown::ModuleHandle,
        storage::{settings::SettingsStore, usage_store::UsageStore},
    },
    utils::clock::Clock,
};

use super::sampler::ProcessSampler;

/// The sampling loop. Every `check_interval` it asks the sampler which watched apps run and hands
/// them to the [Accumulator], then lets the accumulator flush once `save_interval` passed.
pub struct MonitorModule<S> {
    accumulator: Arc<Accumulator<S>>,
    // Sampling blocks, so it runs on the blocking pool.
    sampler: Arc<Mutex<Box<dyn ProcessSampler>>>,
    settings: Arc<SettingsStore>,
    shutdown: CancellationToken,
    check_interval: Duration,
    save_interval: Duration,
    time_provider: Box<dyn Clock>,
}

impl<S: UsageStore + Send + Sync + 'static> MonitorModule<S> {
    pub fn new(
        accumulator: Arc<Accumulator<S>>,
        sampler: Box<dyn ProcessSampler>,
        settings: Arc<SettingsStore>,
        shutdown: CancellationToken,
        check_interval: Duration,
        save_interval: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            accumulator,
            sampler: Arc::new(Mutex::new(sampler)),
            settings,
            shutdown,
            check_interval,
            save_interval,
            time_provider,
        }
    }

    async fn tick(&mut self) {
        // The watchlist is re-read on every tick so edits from the cli apply without a restart.
        let watchlist = self.settings.watchlist().await;
        if watchlist.is_empty() {
            trace!("Watchlist is empty, skipping sample");
            return;
        }

        let sampler = self.sampler.clone();
        let sampled = tokio::task::spawn_blocking(move || {
            let mut sampler = sampler
                .lock()
                .map_err(|_| anyhow!("Sampler lock is poisoned"))?;
            sampler.running_apps(&watchlist)
        })
        .await;

        match sampled.unwrap_or_else(|e| Err(e.into())) {
            Ok(running) => {
                debug!("Running watched apps {:?}", running);
                self.accumulator
                    .record_tick(running, self.check_interval.as_secs())
                    .await;
            }
            Err(e) => {
                error!("Encountered an error during sampling {:?}", e)
            }
        }
    }

    /// Executes the monitor event loop.
    pub async fn run(mut self) -> Result<()> {
        info!(
            "Monitor loop started, sampling every {:?}, saving every {:?}",
            self.check_interval, self.save_interval
        );
        let mut collection_point = self.time_provider.instant();
        loop {
            collection_point += self.check_interval;

            self.tick().await;

            let span = info_span!("Flushing accumulated time");
            if let Some(report) = self
                .accumulator
                .flush_if_due(self.save_interval)
                .instrument(span)
                .await
            {
                report.log();
            }

            tokio::select! {
                // Cancelation only stops sampling. The final flush is done by [MonitorHandle::stop].
                _ = self.shutdown.cancelled() => {
                    info!("Monitor loop ended");
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(collection_point) => ()
            }
        }
    }

    pub fn spawn(self) -> MonitorHandle<S> {
        let accumulator = self.accumulator.clone();
        let shutdown = self.shutdown.clone();
        MonitorHandle {
            module: ModuleHandle::spawn("monitor", shutdown, self.run()),
            accumulator,
        }
    }
}

/// Running monitor loop together with the accumulator it feeds.
pub struct MonitorHandle<S> {
    module: ModuleHandle,
    accumulator: Arc<Accumulator<S>>,
}

impl<S: UsageStore> MonitorHandle<S> {
    pub fn accumulator(&self) -> &Arc<Accumulator<S>> {
        &self.accumulator
    }

    /// Stops the loop, waiting at most `timeout` for it, and saves whatever was accumulated since
    /// the last flush.
    pub async fn stop(self, timeout: Duration) -> FlushReport {
        self.module.stop(timeout).await;
        let report = self.accumulator.force_save().await;
        report.log();
        report
    }
}
