use std::{
    collections::{BTreeMap, HashMap},
    mem,
    time::Duration,
};

use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, error, info};

use crate::{daemon::storage::usage_store::UsageStore, utils::clock::Clock};

/// Outcome of moving pending seconds into the usage store.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub saved: BTreeMap<String, u64>,
    /// Seconds lost because the store rejected them. They are not requeued.
    pub dropped: BTreeMap<String, u64>,
}

impl FlushReport {
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty() && self.dropped.is_empty()
    }

    pub fn saved_seconds(&self) -> u64 {
        self.saved.values().sum()
    }

    pub fn log(&self) {
        if !self.dropped.is_empty() {
            error!("Flush dropped unsaved time {:?}", self.dropped);
        }
        if !self.saved.is_empty() {
            info!("Flushed accumulated time {:?}", self.saved);
        }
    }
}

struct PendingState {
    counters: HashMap<String, u64>,
    last_flush: Instant,
}

/// Holds seconds that were observed but not yet written to the store. All mutations of the
/// counters, including a whole flush, happen under a single lock, so a flush never races with a
/// tick.
pub struct Accumulator<S> {
    store: S,
    state: Mutex<PendingState>,
    time_provider: Box<dyn Clock>,
}

impl<S: UsageStore> Accumulator<S> {
    pub fn new(store: S, time_provider: Box<dyn Clock>) -> Self {
        let last_flush = time_provider.instant();
        Self {
            store,
            state: Mutex::new(PendingState {
                counters: HashMap::new(),
                last_flush,
            }),
            time_provider,
        }
    }

    /// Adds `check_interval` seconds to every app in `running`.
    pub async fn record_tick(&self, running: impl IntoIterator<Item = String>, check_interval: u64) {
        let mut state = self.state.lock().await;
        for app_name in running {
            *state.counters.entry(app_name).or_insert(0) += check_interval;
        }
    }

    /// Flushes when at least `save_interval` passed since the previous flush.
    pub async fn flush_if_due(&self, save_interval: Duration) -> Option<FlushReport> {
        let mut state = self.state.lock().await;
        if self.time_provider.instant() - state.last_flush < save_interval {
            return None;
        }
        Some(self.flush_locked(&mut state).await)
    }

    /// Immediately moves pending seconds to the store. Readers call this before querying totals
    /// so time that wasn't flushed yet is visible.
    pub async fn force_save(&self) -> FlushReport {
        let mut state = self.state.lock().await;
        let report = self.flush_locked(&mut state).await;
        info!("Forced save completed, {}s saved", report.saved_seconds());
        report
    }

    /// Snapshot of seconds not yet written to the store.
    pub async fn pending(&self) -> HashMap<String, u64> {
        self.state.lock().await.counters.clone()
    }

    async fn flush_locked(&self, state: &mut PendingState) -> FlushReport {
        let mut report = FlushReport::default();
        let counters = mem::take(&mut state.counters);
        state.last_flush = self.time_provider.instant();

        if counters.is_empty() {
            return report;
        }

        let today = self.time_provider.today();
        for (app_name, seconds) in counters {
            if seconds == 0 {
                continue;
            }
            match self.store.upsert_add(&app_name, today, seconds).await {
                Ok(()) => {
                    debug!("Saved {seconds}s for {app_name}");
                    report.saved.insert(app_name, seconds);
                }
                Err(e) => {
                    error!("Error saving {seconds}s for {app_name}, dropping them: {e:?}");
                    report.dropped.insert(app_name, seconds);
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, time::Duration};

    use anyhow::Result;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    use super::{Accumulator, FlushReport};
    use crate::{
        daemon::storage::{
            test_store::MemoryUsageStore,
            usage_store::UsageStore,
        },
        utils::clock::test_clock::TestClock,
    };

    const TEST_START_DATE: NaiveDateTime = NaiveDateTime::new(
        NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(),
        NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
    );

    fn accumulator(store: Arc<MemoryUsageStore>) -> Accumulator<Arc<MemoryUsageStore>> {
        Accumulator::new(store, Box::new(TestClock::starting_at(TEST_START_DATE)))
    }

    fn apps(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_accumulate_until_flush() -> Result<()> {
        let store = Arc::new(MemoryUsageStore::default());
        let accumulator = accumulator(store.clone());

        accumulator.record_tick(apps(&["chrome.exe", "code.exe"]), 5).await;
        accumulator.record_tick(apps(&["chrome.exe"]), 5).await;

        assert_eq!(accumulator.pending().await.get("chrome.exe"), Some(&10));
        assert!(store
            .stats_for_date(TEST_START_DATE.date())
            .await?
            .is_empty());

        let report = accumulator.force_save().await;

        assert_eq!(report.saved.get("chrome.exe"), Some(&10));
        assert_eq!(report.saved.get("code.exe"), Some(&5));
        assert!(accumulator.pending().await.is_empty());
        assert_eq!(store.seconds("chrome.exe", TEST_START_DATE.date()), 10);
        assert_eq!(store.seconds("code.exe", TEST_START_DATE.date()), 5);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_adds_to_existing_totals() -> Result<()> {
        let store = Arc::new(MemoryUsageStore::default());
        store
            .upsert_add("chrome.exe", TEST_START_DATE.date(), 100)
            .await?;
        let accumulator = accumulator(store.clone());

        accumulator.record_tick(apps(&["chrome.exe"]), 5).await;
        accumulator.force_save().await;
        accumulator.record_tick(apps(&["chrome.exe"]), 5).await;
        accumulator.force_save().await;

        assert_eq!(store.seconds("chrome.exe", TEST_START_DATE.date()), 110);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_waits_for_save_interval() -> Result<()> {
        let store = Arc::new(MemoryUsageStore::default());
        let accumulator = accumulator(store.clone());
        let save_interval = Duration::from_secs(60);

        accumulator.record_tick(apps(&["chrome.exe"]), 5).await;
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(accumulator.flush_if_due(save_interval).await, None);

        tokio::time::advance(Duration::from_secs(30)).await;
        let report = accumulator.flush_if_due(save_interval).await;
        assert_eq!(report.map(|v| v.saved_seconds()), Some(5));

        // The timer restarts after every flush, even one that saved nothing.
        assert_eq!(accumulator.flush_if_due(save_interval).await, None);
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(
            accumulator.flush_if_due(save_interval).await,
            Some(FlushReport::default())
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_app_is_dropped_others_saved() -> Result<()> {
        let store = Arc::new(MemoryUsageStore::failing_for(&["broken.exe"]));
        let accumulator = accumulator(store.clone());

        accumulator
            .record_tick(apps(&["broken.exe", "chrome.exe"]), 5)
            .await;
        let report = accumulator.force_save().await;

        assert_eq!(report.dropped.get("broken.exe"), Some(&5));
        assert_eq!(report.saved.get("chrome.exe"), Some(&5));
        assert!(accumulator.pending().await.is_empty());

        // Dropped seconds are not retried on the next flush.
        let report = accumulator.force_save().await;
        assert!(report.is_empty());
        assert_eq!(store.seconds("chrome.exe", TEST_START_DATE.date()), 5);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_save_makes_pending_time_visible() -> Result<()> {
        let store = Arc::new(MemoryUsageStore::default());
        let accumulator = accumulator(store.clone());

        for _ in 0..7 {
            accumulator.record_tick(apps(&["valorant.exe"]), 5).await;
        }
        let pending = accumulator.pending().await["valorant.exe"];
        accumulator.force_save().await;

        let stats = store.stats_for_date(TEST_START_DATE.date()).await?;
        assert_eq!(stats.len(), 1);
        assert!(stats[0].seconds >= pending);
        Ok(())
    }
}
