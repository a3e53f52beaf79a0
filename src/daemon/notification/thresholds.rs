use std::collections::BTreeMap;

use anyhow::Result;
use tracing::info;

use crate::daemon::storage::settings::{validate_threshold, Settings, SettingsStore};

/// Daily limit for apps that have neither an override nor a built-in default.
pub const FALLBACK_THRESHOLD_HOURS: f64 = 2.0;

pub const DEFAULT_THRESHOLDS: [(&str, f64); 6] = [
    ("chrome.exe", 4.),
    ("discord.exe", 3.),
    ("valorant.exe", 4.),
    ("firefox.exe", 4.),
    ("vscode.exe", 8.),
    ("code.exe", 8.),
];

pub fn default_thresholds() -> BTreeMap<String, f64> {
    DEFAULT_THRESHOLDS
        .iter()
        .map(|(app, hours)| (app.to_string(), *hours))
        .collect()
}

/// Resolves the daily limit of `app_name` in hours. Configured overrides win over built-in
/// defaults, exact names win over case-insensitive matches.
pub fn threshold_for(settings: &Settings, app_name: &str) -> f64 {
    if let Some(configured) = &settings.notification_thresholds {
        if let Some(hours) = configured.get(app_name) {
            return *hours;
        }
        if let Some((_, hours)) = configured
            .iter()
            .find(|(app, _)| app.to_lowercase() == app_name.to_lowercase())
        {
            return *hours;
        }
    }

    DEFAULT_THRESHOLDS
        .iter()
        .find(|(app, _)| app.eq_ignore_ascii_case(app_name))
        .map(|(_, hours)| *hours)
        .unwrap_or(FALLBACK_THRESHOLD_HOURS)
}

/// Stores an override. The first override copies the built-in table into settings, so
/// the defaults stay visible and editable next to it.
pub async fn set_threshold(settings: &SettingsStore, app_name: &str, hours: f64) -> Result<()> {
    let app_name = app_name.trim().to_owned();
    validate_threshold(&app_name, hours)?;
    settings
        .update(|current| {
            current
                .notification_thresholds
                .get_or_insert_with(default_thresholds)
                .insert(app_name.clone(), hours);
            Ok(())
        })
        .await?;
    info!("Threshold set: {app_name} -> {hours}h");
    Ok(())
}

pub async fn reset_thresholds(settings: &SettingsStore) -> Result<()> {
    settings
        .update(|current| {
            current.notification_thresholds = Some(default_thresholds());
            Ok(())
        })
        .await?;
    info!("Thresholds reset to defaults");
    Ok(())
}
