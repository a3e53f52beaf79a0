use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use collection::{
    monitor::{MonitorHandle, MonitorModule},
    sampler::{ProcessSampler, SysinfoSampler},
};
use notification::{
    sink::{DesktopNotifier, NotificationSink},
    NotificationModule, DEFAULT_NOTIFICATION_INTERVAL,
};
use flush::{FlushModule, FLUSH_REQUEST_CAPACITY};
use processing::accumulator::Accumulator;
use shutdown::ModuleHandle;
use storage::{
    settings::{Settings, SettingsStore},
    usage_store::{SqliteUsageStore, UsageStore},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::utils::{
    clock::{Clock, DefaultClock},
    dir::{database_path, settings_path},
    time::format_duration,
};

pub mod args;
pub mod collection;
pub mod flush;
pub mod notification;
pub mod processing;
pub mod shutdown;
pub mod storage;

const MONITOR_STOP_TIMEOUT: Duration = Duration::from_secs(10);
const MODULE_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf) -> Result<()> {
    std::env::set_current_dir("/")?;

    let settings = Arc::new(SettingsStore::open(settings_path(&dir)).await?);
    let store = Arc::new(SqliteUsageStore::new(database_path(&dir))?);

    let shutdown_token = CancellationToken::new();
    let current = settings.load().await;

    let monitor = create_monitor(
        store.clone(),
        SysinfoSampler::new(),
        settings.clone(),
        &current,
        &shutdown_token,
        DefaultClock,
    )
    .spawn();
    let notifier = create_notifier(
        store.clone(),
        DesktopNotifier,
        settings,
        &shutdown_token,
        DEFAULT_NOTIFICATION_INTERVAL,
        DefaultClock,
    );
    let (flush_requests, flush_receiver) = mpsc::channel(FLUSH_REQUEST_CAPACITY);
    let flusher = ModuleHandle::spawn(
        "flush",
        shutdown_token.clone(),
        FlushModule::new(
            monitor.accumulator().clone(),
            flush_receiver,
            shutdown_token.clone(),
        )
        .run(),
    );
    let mut modules = vec![notifier, flusher];

    #[cfg(unix)]
    modules.push(ModuleHandle::spawn(
        "flush signal",
        shutdown_token.clone(),
        flush::forward_flush_signals(flush_requests, shutdown_token.clone())?,
    ));
    #[cfg(not(unix))]
    drop(flush_requests);

    shutdown::detect_shutdown(shutdown_token).await;

    stop_modules(monitor, modules).await;
    log_today_summary(&store, DefaultClock.today()).await;
    Ok(())
}

async fn stop_modules<S: UsageStore>(monitor: MonitorHandle<S>, modules: Vec<ModuleHandle>) {
    let report = monitor.stop(MONITOR_STOP_TIMEOUT).await;
    info!(
        "Saved {} on shutdown",
        format_duration(report.saved_seconds())
    );
    for module in modules {
        module.stop(MODULE_STOP_TIMEOUT).await;
    }
}

async fn log_today_summary(store: &impl UsageStore, today: chrono::NaiveDate) {
    match store.stats_for_date(today).await {
        Ok(stats) => {
            for usage in stats {
                info!("{}: {} today", usage.app_name, format_duration(usage.seconds));
            }
        }
        Err(e) => error!("Failed to read today's usage {e:?}"),
    }
}

fn create_monitor<S: UsageStore + Send + Sync + 'static>(
    store: S,
    sampler: impl ProcessSampler + 'static,
    settings: Arc<SettingsStore>,
    current: &Settings,
    shutdown_token: &CancellationToken,
    clock: impl Clock + Clone,
) -> MonitorModule<S> {
    // Intervals are read once. Changing them takes effect after a daemon restart.
    MonitorModule::new(
        Arc::new(Accumulator::new(store, Box::new(clock.clone()))),
        Box::new(sampler),
        settings,
        shutdown_token.clone(),
        Duration::from_secs(current.check_interval_seconds),
        Duration::from_secs(current.save_interval_seconds),
        Box::new(clock),
    )
}

fn create_notifier<S: UsageStore + Send + Sync + 'static>(
    store: S,
    sink: impl NotificationSink + 'static,
    settings: Arc<SettingsStore>,
    shutdown_token: &CancellationToken,
    check_frequency: Duration,
    clock: impl Clock,
) -> ModuleHandle {
    let module = NotificationModule::new(
        store,
        settings,
        Box::new(sink),
        shutdown_token.clone(),
        check_frequency,
        Box::new(clock),
    );
    ModuleHandle::spawn("notification", shutdown_token.clone(), module.run())
}
