use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::time::days_before;

/// Total usage of one application over a queried period.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct AppUsage {
    pub app_name: Arc<str>,
    pub seconds: u64,
}

impl AppUsage {
    pub fn new(app_name: impl Into<Arc<str>>, seconds: u64) -> Self {
        Self {
            app_name: app_name.into(),
            seconds,
        }
    }

    pub fn hours(&self) -> f64 {
        self.seconds as f64 / 3600.
    }
}

/// Sums usage of all entries. Used for showing shares of the whole period.
pub fn total_seconds(usages: &[AppUsage]) -> u64 {
    usages.iter().map(|v| v.seconds).sum()
}

/// Periods the statistics can be requested for. All bounds are inclusive local dates.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum StatsRange {
    Today,
    /// Last 7 days, today included.
    Week,
    /// Last 30 days, today included.
    Month,
    Custom { start: NaiveDate, end: NaiveDate },
}

impl StatsRange {
    pub fn bounds(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match *self {
            StatsRange::Today => (today, today),
            StatsRange::Week => (days_before(today, 6), today),
            StatsRange::Month => (days_before(today, 29), today),
            StatsRange::Custom { start, end } => (start, end),
        }
    }
}
