//! Warns the user once per day and app when its recorded usage crosses the configured limit.

pub mod quiet_hours;
pub mod sink;
pub mod thresholds;

use std::{collections::HashSet, sync::Arc, time::Duration};

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    daemon::storage::{settings::SettingsStore, usage_store::UsageStore},
    utils::clock::Clock,
};

use quiet_hours::QuietHours;
use sink::{NotificationSink, UsageAlert};
use thresholds::threshold_for;

pub const DEFAULT_NOTIFICATION_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct AlertState {
    sent_today: HashSet<String>,
    last_check_date: Option<NaiveDate>,
    snooze_until: Option<DateTime<Local>>,
}

impl AlertState {
    fn roll_over(&mut self, today: NaiveDate) {
        if self.last_check_date != Some(today) {
            self.sent_today.clear();
            self.last_check_date = Some(today);
        }
    }
}

pub struct NotificationModule<S> {
    store: S,
    settings: Arc<SettingsStore>,
    sink: Box<dyn NotificationSink>,
    shutdown: CancellationToken,
    check_frequency: Duration,
    time_provider: Box<dyn Clock>,
    state: AlertState,
}

impl<S: UsageStore + Send + Sync + 'static> NotificationModule<S> {
    pub fn new(
        store: S,
        settings: Arc<SettingsStore>,
        sink: Box<dyn NotificationSink>,
        shutdown: CancellationToken,
        check_frequency: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            store,
            settings,
            sink,
            shutdown,
            check_frequency,
            time_provider,
            state: AlertState::default(),
        }
    }

    /// Runs one threshold check at `now`. Returns apps that were notified.
    pub async fn check_at(&mut self, now: DateTime<Local>) -> Result<Vec<String>> {
        let settings = self.settings.load().await;

        if let Some(quiet) = QuietHours::from_settings(&settings) {
            if quiet.contains(now.time()) {
                debug!("Quiet hours, skipping threshold check");
                return Ok(vec![]);
            }
        }
        if matches!(self.state.snooze_until, Some(until) if now < until) {
            debug!("Notifications snoozed until {:?}", self.state.snooze_until);
            return Ok(vec![]);
        }

        let today = now.date_naive();
        self.state.roll_over(today);

        let mut notified = vec![];
        for usage in self.store.stats_for_date(today).await? {
            if self.state.sent_today.contains(usage.app_name.as_ref()) {
                continue;
            }

            let threshold_hours = threshold_for(&settings, &usage.app_name);
            if (usage.seconds as f64) < threshold_hours * 3600. {
                continue;
            }

            let alert = UsageAlert {
                app_name: usage.app_name.to_string(),
                used_seconds: usage.seconds,
                threshold_hours,
            };
            match self.sink.notify(&alert) {
                Ok(()) => {
                    info!("Notification sent: {}", alert.message());
                    self.state.sent_today.insert(alert.app_name.clone());
                    notified.push(alert.app_name);
                    if let Some(minutes) = settings.notification_snooze_minutes.filter(|v| *v > 0) {
                        self.state.snooze_until =
                            Some(now + chrono::Duration::minutes(minutes as i64));
                    }
                }
                Err(e) => {
                    error!("Error sending notification for {}: {e:?}", alert.app_name)
                }
            }
        }
        Ok(notified)
    }

    /// Executes the notification event loop.
    pub async fn run(mut self) -> Result<()> {
        info!("Notification loop started");
        let mut check_point = self.time_provider.instant();
        loop {
            check_point += self.check_frequency;

            let now = self.time_provider.time();
            if let Err(e) = self.check_at(now).await {
                error!("Error checking thresholds {e:?}");
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Notification loop ended");
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(check_point) => ()
            }
        }
    }
}
