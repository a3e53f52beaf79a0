//!  Storage is split in two:
//!   - [settings::SettingsStore] owns the JSON settings document with the watchlist and tunables.
//!   - [usage_store::SqliteUsageStore] keeps one row of accumulated seconds per app and local day.

pub mod entities;
pub mod settings;
pub mod usage_store;

#[cfg(test)]
pub mod test_store;
