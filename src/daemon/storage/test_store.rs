//! In-memory [UsageStore] for tests of code that sits on top of the store.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Mutex,
};

use anyhow::{anyhow, Result};
use chrono::NaiveDate;

use super::{entities::AppUsage, usage_store::UsageStore};

#[derive(Default)]
pub struct MemoryUsageStore {
    records: Mutex<BTreeMap<(String, NaiveDate), u64>>,
    failing: HashSet<String>,
}

impl MemoryUsageStore {
    /// Store that refuses writes for the given apps.
    pub fn failing_for(apps: &[&str]) -> Self {
        Self {
            records: Mutex::default(),
            failing: apps.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn seconds(&self, app_name: &str, date: NaiveDate) -> u64 {
        self.records
            .lock()
            .unwrap()
            .get(&(app_name.to_string(), date))
            .copied()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }

    fn collect(&self, filter: impl Fn(NaiveDate) -> bool) -> Vec<AppUsage> {
        let mut totals = HashMap::<String, u64>::new();
        for ((app, date), seconds) in self.records.lock().unwrap().iter() {
            if filter(*date) {
                *totals.entry(app.clone()).or_default() += seconds;
            }
        }
        let mut usages = totals
            .into_iter()
            .map(|(app, seconds)| AppUsage::new(app, seconds))
            .collect::<Vec<_>>();
        usages.sort_by(|a, b| b.seconds.cmp(&a.seconds).then(a.app_name.cmp(&b.app_name)));
        usages
    }
}

impl UsageStore for MemoryUsageStore {
    async fn upsert_add(&self, app_name: &str, date: NaiveDate, delta_seconds: u64) -> Result<()> {
        if self.failing.contains(app_name) {
            return Err(anyhow!("Writes for {app_name} are disabled"));
        }
        *self
            .records
            .lock()
            .unwrap()
            .entry((app_name.to_string(), date))
            .or_default() += delta_seconds;
        Ok(())
    }

    async fn stats_for_date(&self, date: NaiveDate) -> Result<Vec<AppUsage>> {
        Ok(self.collect(|v| v == date))
    }

    async fn stats_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<AppUsage>> {
        Ok(self.collect(|v| start <= v && v <= end))
    }

    async fn tracked_apps(&self) -> Result<Vec<String>> {
        let mut apps = self
            .records
            .lock()
            .unwrap()
            .keys()
            .map(|(app, _)| app.clone())
            .collect::<Vec<_>>();
        apps.sort();
        apps.dedup();
        Ok(apps)
    }

    async fn purge_older_than(&self, cutoff: NaiveDate) -> Result<usize> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|(_, date), _| *date >= cutoff);
        Ok(before - records.len())
    }
}
