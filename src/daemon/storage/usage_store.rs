use std::{
    future::Future,
    ops::Deref,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::utils::time::{date_to_key, days_before};

use super::entities::{AppUsage, StatsRange};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS usage_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    app_name TEXT NOT NULL,
    date TEXT NOT NULL,
    duration_seconds INTEGER NOT NULL DEFAULT 0 CHECK (duration_seconds >= 0),
    UNIQUE(app_name, date)
);

CREATE INDEX IF NOT EXISTS idx_app_date ON usage_logs(app_name, date);
"#;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Interface for abstracting storage of per-day usage totals.
pub trait UsageStore {
    /// Adds `delta_seconds` to the record of `app_name` for `date`, creating the record when it
    /// doesn't exist yet.
    fn upsert_add(
        &self,
        app_name: &str,
        date: NaiveDate,
        delta_seconds: u64,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Usage of every app recorded for exactly `date`.
    fn stats_for_date(&self, date: NaiveDate) -> impl Future<Output = Result<Vec<AppUsage>>> + Send;

    /// Usage summed per app over `start..=end`.
    fn stats_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<Vec<AppUsage>>> + Send;

    /// Every app that has ever been recorded, sorted by name.
    fn tracked_apps(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Deletes records with a date strictly before `cutoff`. Returns the amount of deleted rows.
    fn purge_older_than(&self, cutoff: NaiveDate) -> impl Future<Output = Result<usize>> + Send;

    fn stats_for_range(
        &self,
        range: StatsRange,
        today: NaiveDate,
    ) -> impl Future<Output = Result<Vec<AppUsage>>> + Send {
        let (start, end) = range.bounds(today);
        self.stats_between(start, end)
    }

    /// Keeps the last `days_to_keep` days before `today`, today included.
    fn purge_retaining(
        &self,
        today: NaiveDate,
        days_to_keep: u64,
    ) -> impl Future<Output = Result<usize>> + Send {
        self.purge_older_than(retention_cutoff(today, days_to_keep))
    }
}

/// First date that survives a purge with the given retention.
pub fn retention_cutoff(today: NaiveDate, days_to_keep: u64) -> NaiveDate {
    days_before(today, days_to_keep)
}

impl<T: Deref + Sync> UsageStore for T
where
    T::Target: UsageStore,
{
    fn upsert_add(
        &self,
        app_name: &str,
        date: NaiveDate,
        delta_seconds: u64,
    ) -> impl Future<Output = Result<()>> + Send {
        self.deref().upsert_add(app_name, date, delta_seconds)
    }

    fn stats_for_date(&self, date: NaiveDate) -> impl Future<Output = Result<Vec<AppUsage>>> + Send {
        self.deref().stats_for_date(date)
    }

    fn stats_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<Vec<AppUsage>>> + Send {
        self.deref().stats_between(start, end)
    }

    fn tracked_apps(&self) -> impl Future<Output = Result<Vec<String>>> + Send {
        self.deref().tracked_apps()
    }

    fn purge_older_than(&self, cutoff: NaiveDate) -> impl Future<Output = Result<usize>> + Send {
        self.deref().purge_older_than(cutoff)
    }
}

/// The main realization of [UsageStore]. A connection is opened per operation and the blocking
/// SQLite work is moved off the async executor.
pub struct SqliteUsageStore {
    path: PathBuf,
}

impl SqliteUsageStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory {parent:?}"))?;
        }

        let conn = open_connection(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize usage schema")?;
        info!("Usage database initialized at {path:?}");

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_connection<T, F>(&self, operation: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<T> {
            let mut conn = open_connection(&path)?;
            Ok(operation(&mut conn)?)
        })
        .await?
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let conn =
        Connection::open(path).with_context(|| format!("Failed to open database {path:?}"))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

fn read_usages(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> rusqlite::Result<Vec<AppUsage>> {
    let mut statement = conn.prepare(sql)?;
    let rows = statement.query_map(params, |row| {
        let app_name: String = row.get(0)?;
        let seconds: i64 = row.get(1)?;
        Ok(AppUsage::new(app_name, seconds.max(0) as u64))
    })?;
    rows.collect()
}

impl UsageStore for SqliteUsageStore {
    async fn upsert_add(&self, app_name: &str, date: NaiveDate, delta_seconds: u64) -> Result<()> {
        let delta = i64::try_from(delta_seconds)
            .with_context(|| format!("{delta_seconds}s doesn't fit into the usage table"))?;
        let app_name = app_name.to_owned();
        let date = date_to_key(date);
        debug!("Adding {delta}s to {app_name} on {date}");

        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO usage_logs (app_name, date, duration_seconds)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(app_name, date) DO UPDATE SET
                    duration_seconds = duration_seconds + excluded.duration_seconds",
                params![app_name, date, delta],
            )
        })
        .await?;
        Ok(())
    }

    async fn stats_for_date(&self, date: NaiveDate) -> Result<Vec<AppUsage>> {
        let date = date_to_key(date);
        self.with_connection(move |conn| {
            read_usages(
                conn,
                "SELECT app_name, duration_seconds
                 FROM usage_logs
                 WHERE date = ?1
                 ORDER BY duration_seconds DESC, app_name ASC",
                params![date],
            )
        })
        .await
    }

    async fn stats_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<AppUsage>> {
        let start = date_to_key(start);
        let end = date_to_key(end);
        self.with_connection(move |conn| {
            read_usages(
                conn,
                "SELECT app_name, SUM(duration_seconds) AS total
                 FROM usage_logs
                 WHERE date >= ?1 AND date <= ?2
                 GROUP BY app_name
                 ORDER BY total DESC, app_name ASC",
                params![start, end],
            )
        })
        .await
    }

    async fn tracked_apps(&self) -> Result<Vec<String>> {
        self.with_connection(|conn| {
            let mut statement =
                conn.prepare("SELECT DISTINCT app_name FROM usage_logs ORDER BY app_name")?;
            let rows = statement.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect()
        })
        .await
    }

    async fn purge_older_than(&self, cutoff: NaiveDate) -> Result<usize> {
        let cutoff = date_to_key(cutoff);
        let deleted = self
            .with_connection(move |conn| {
                conn.execute("DELETE FROM usage_logs WHERE date < ?1", params![cutoff])
            })
            .await?;
        info!("Cleaned up {deleted} old records");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::NaiveDate;
    use rusqlite::Connection;
    use tempfile::tempdir;

    use super::{retention_cutoff, SqliteUsageStore, UsageStore};
    use crate::daemon::storage::entities::{AppUsage, StatsRange};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_adds_to_existing_row() -> Result<()> {
        let dir = tempdir()?;
        let store = SqliteUsageStore::new(dir.path().join("tracker.db"))?;
        let day = date(2024, 1, 1);

        store.upsert_add("x.exe", day, 30).await?;
        store.upsert_add("x.exe", day, 15).await?;

        assert_eq!(
            store.stats_for_date(day).await?,
            vec![AppUsage::new("x.exe", 45)]
        );

        let conn = Connection::open(store.path())?;
        let rows: i64 = conn.query_row(
            "SELECT COUNT(*) FROM usage_logs WHERE app_name = 'x.exe'",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(rows, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_stats_for_date_only_includes_that_day() -> Result<()> {
        let dir = tempdir()?;
        let store = SqliteUsageStore::new(dir.path().join("tracker.db"))?;

        store.upsert_add("chrome.exe", date(2024, 1, 1), 60).await?;
        store.upsert_add("discord.exe", date(2024, 1, 1), 120).await?;
        store.upsert_add("chrome.exe", date(2024, 1, 2), 500).await?;

        assert_eq!(
            store.stats_for_date(date(2024, 1, 1)).await?,
            vec![
                AppUsage::new("discord.exe", 120),
                AppUsage::new("chrome.exe", 60)
            ]
        );
        assert!(store.stats_for_date(date(2024, 1, 3)).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_stats_between_sums_inclusive_range() -> Result<()> {
        let dir = tempdir()?;
        let store = SqliteUsageStore::new(dir.path().join("tracker.db"))?;

        store.upsert_add("chrome.exe", date(2024, 1, 1), 60).await?;
        store.upsert_add("chrome.exe", date(2024, 1, 3), 40).await?;
        store.upsert_add("chrome.exe", date(2024, 1, 4), 1000).await?;
        store.upsert_add("code.exe", date(2024, 1, 2), 100).await?;

        assert_eq!(
            store.stats_between(date(2024, 1, 1), date(2024, 1, 3)).await?,
            vec![
                AppUsage::new("chrome.exe", 100),
                AppUsage::new("code.exe", 100)
            ]
        );
        assert!(store
            .stats_between(date(2024, 1, 5), date(2024, 1, 1))
            .await?
            .is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_stats_for_week_range() -> Result<()> {
        let dir = tempdir()?;
        let store = SqliteUsageStore::new(dir.path().join("tracker.db"))?;
        let today = date(2024, 1, 10);

        store.upsert_add("chrome.exe", date(2024, 1, 4), 10).await?;
        store.upsert_add("chrome.exe", date(2024, 1, 3), 1000).await?;
        store.upsert_add("chrome.exe", today, 5).await?;

        assert_eq!(
            store.stats_for_range(StatsRange::Week, today).await?,
            vec![AppUsage::new("chrome.exe", 15)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_tracked_apps() -> Result<()> {
        let dir = tempdir()?;
        let store = SqliteUsageStore::new(dir.path().join("tracker.db"))?;

        store.upsert_add("valorant.exe", date(2024, 1, 1), 1).await?;
        store.upsert_add("chrome.exe", date(2024, 1, 1), 1).await?;
        store.upsert_add("chrome.exe", date(2024, 1, 2), 1).await?;

        assert_eq!(
            store.tracked_apps().await?,
            vec!["chrome.exe".to_string(), "valorant.exe".to_string()]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_purge_keeps_retention_window() -> Result<()> {
        let dir = tempdir()?;
        let store = SqliteUsageStore::new(dir.path().join("tracker.db"))?;
        let today = date(2024, 6, 1);
        let cutoff = retention_cutoff(today, 90);

        store
            .upsert_add("old.exe", cutoff.pred_opt().unwrap(), 10)
            .await?;
        store.upsert_add("edge.exe", cutoff, 20).await?;
        store.upsert_add("new.exe", today, 30).await?;

        let deleted = store.purge_retaining(today, 90).await?;

        assert_eq!(deleted, 1);
        assert_eq!(
            store.tracked_apps().await?,
            vec!["edge.exe".to_string(), "new.exe".to_string()]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_store_reopens_existing_database() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("tracker.db");
        SqliteUsageStore::new(path.clone())?
            .upsert_add("chrome.exe", date(2024, 1, 1), 60)
            .await?;

        let store = SqliteUsageStore::new(path)?;
        store.upsert_add("chrome.exe", date(2024, 1, 1), 60).await?;

        assert_eq!(
            store.stats_for_date(date(2024, 1, 1)).await?,
            vec![AppUsage::new("chrome.exe", 120)]
        );
        Ok(())
    }
}
