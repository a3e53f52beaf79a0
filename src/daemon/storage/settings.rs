use std::{collections::BTreeMap, fmt::Display, path::PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    fs::operations::{read_locked, write_locked},
    utils::time::parse_clock_time,
};

pub const DEFAULT_CHECK_INTERVAL_SECONDS: u64 = 5;
pub const DEFAULT_SAVE_INTERVAL_SECONDS: u64 = 60;

fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECONDS
}

fn default_save_interval() -> u64 {
    DEFAULT_SAVE_INTERVAL_SECONDS
}

fn default_theme() -> String {
    "dark".into()
}

fn default_minimize_to_tray() -> bool {
    true
}

/// Typed view over `settings.json`. Keys this application doesn't know about are kept in
/// [Settings::extra] and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub watchlist: Vec<String>,
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    #[serde(default = "default_save_interval")]
    pub save_interval_seconds: u64,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_minimize_to_tray")]
    pub minimize_to_tray: bool,
    /// Daily limits in hours. `None` means the built-in table is in effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_thresholds: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_hours_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_hours_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_snooze_minutes: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            watchlist: vec![],
            check_interval_seconds: DEFAULT_CHECK_INTERVAL_SECONDS,
            save_interval_seconds: DEFAULT_SAVE_INTERVAL_SECONDS,
            theme: default_theme(),
            minimize_to_tray: default_minimize_to_tray(),
            notification_thresholds: None,
            quiet_hours_start: None,
            quiet_hours_end: None,
            notification_snooze_minutes: None,
            extra: Map::new(),
        }
    }
}

impl Settings {
    /// Checks values serde can't express. Invalid documents are never written to disk.
    pub fn validate(&self) -> Result<()> {
        if self.check_interval_seconds == 0 {
            bail!("check_interval_seconds must be at least 1");
        }
        if self.save_interval_seconds == 0 {
            bail!("save_interval_seconds must be at least 1");
        }
        if let Some(thresholds) = &self.notification_thresholds {
            for (app, hours) in thresholds {
                validate_threshold(app, *hours)?;
            }
        }
        for value in [&self.quiet_hours_start, &self.quiet_hours_end] {
            if let Some(time) = clock_setting(value) {
                parse_clock_time(time)?;
            }
        }
        Ok(())
    }

    /// Builds settings from a parsed document. Known keys holding a value of the wrong type are
    /// dropped one by one, the rest of the document is kept.
    pub fn from_document(document: Map<String, Value>) -> Self {
        let error = match serde_json::from_value(Value::Object(document.clone())) {
            Ok(settings) => return settings,
            Err(e) => e,
        };
        warn!("Settings document has invalid fields: {error}");

        let kept = document
            .into_iter()
            .filter(|(key, value)| {
                let single = Map::from_iter([(key.clone(), value.clone())]);
                match serde_json::from_value::<Settings>(Value::Object(single)) {
                    Ok(_) => true,
                    Err(e) => {
                        warn!("Ignoring setting {key} = {value}: {e}");
                        false
                    }
                }
            })
            .collect::<Map<_, _>>();

        serde_json::from_value(Value::Object(kept)).unwrap_or_else(|e| {
            error!("Failed to recover settings, using defaults: {e}");
            Settings::default()
        })
    }

    /// Replaces values that parse but are out of range with their defaults. Used for documents
    /// edited by hand, changes made through [SettingsStore] are validated instead.
    pub fn sanitize(&mut self) {
        if self.check_interval_seconds == 0 {
            warn!("Ignoring check_interval_seconds = 0, using {DEFAULT_CHECK_INTERVAL_SECONDS}");
            self.check_interval_seconds = DEFAULT_CHECK_INTERVAL_SECONDS;
        }
        if self.save_interval_seconds == 0 {
            warn!("Ignoring save_interval_seconds = 0, using {DEFAULT_SAVE_INTERVAL_SECONDS}");
            self.save_interval_seconds = DEFAULT_SAVE_INTERVAL_SECONDS;
        }
        if let Some(thresholds) = &mut self.notification_thresholds {
            thresholds.retain(|app, hours| match validate_threshold(app, *hours) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Ignoring threshold: {e}");
                    false
                }
            });
        }
        for value in [&mut self.quiet_hours_start, &mut self.quiet_hours_end] {
            let invalid = clock_setting(value)
                .map(parse_clock_time)
                .transpose()
                .is_err();
            if invalid {
                warn!("Ignoring quiet hours bound {value:?}");
                *value = None;
            }
        }
    }
}

/// A quiet hours bound that is set and not blank. Blank bounds disable quiet hours.
pub fn clock_setting(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn validate_threshold(app: &str, hours: f64) -> Result<()> {
    if !hours.is_finite() || hours <= 0. {
        bail!("Threshold for {app} must be a positive number of hours, got {hours}");
    }
    Ok(())
}

/// Canonical form of a watchlist entry. Returns `None` for names that are blank.
pub fn normalize_app_name(name: &str) -> Option<String> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchlistChange {
    Added(String),
    AlreadyPresent(String),
    Removed(String),
    NotFound(String),
}

impl Display for WatchlistChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchlistChange::Added(app) => write!(f, "Watching {app}"),
            WatchlistChange::AlreadyPresent(app) => write!(f, "{app} is already watched"),
            WatchlistChange::Removed(app) => write!(f, "Stopped watching {app}"),
            WatchlistChange::NotFound(app) => write!(f, "{app} is not in the watchlist"),
        }
    }
}

/// Owns `settings.json`. Every operation re-reads the document, so edits made by another process
/// (the CLI while the daemon runs) are picked up on the next call.
pub struct SettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SettingsStore {
    /// Opens the store, writing the default document when the file doesn't exist yet.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let store = Self {
            path,
            lock: Mutex::new(()),
        };

        if read_locked(&store.path).await?.is_none() {
            store.write(&Settings::default()).await?;
            info!("Created default configuration {:?}", store.path);
        } else {
            info!("Loaded existing configuration {:?}", store.path);
        }
        Ok(store)
    }

    /// Returns current settings. Unreadable documents fall back to defaults.
    pub async fn load(&self) -> Settings {
        let _guard = self.lock.lock().await;
        self.read().await.unwrap_or_else(|e| {
            error!("Error loading settings {e:?}");
            Settings::default()
        })
    }

    pub async fn watchlist(&self) -> Vec<String> {
        self.load().await.watchlist
    }

    pub async fn add_app(&self, name: &str) -> Result<WatchlistChange> {
        let Some(name) = normalize_app_name(name) else {
            bail!("Application name can't be empty");
        };
        self.update(|settings| {
            if settings.watchlist.iter().any(|v| v.to_lowercase() == name) {
                info!("{name} already in watchlist");
                return Ok(WatchlistChange::AlreadyPresent(name));
            }
            settings.watchlist.push(name.clone());
            info!("Added {name} to watchlist");
            Ok(WatchlistChange::Added(name))
        })
        .await
    }

    pub async fn remove_app(&self, name: &str) -> Result<WatchlistChange> {
        let name = name.trim().to_lowercase();
        self.update(|settings| {
            let before = settings.watchlist.len();
            settings.watchlist.retain(|v| v.to_lowercase() != name);
            if settings.watchlist.len() == before {
                info!("{name} not found in watchlist");
                Ok(WatchlistChange::NotFound(name))
            } else {
                info!("Removed {name} from watchlist");
                Ok(WatchlistChange::Removed(name))
            }
        })
        .await
    }

    pub async fn clear_watchlist(&self) -> Result<()> {
        self.update(|settings| {
            settings.watchlist.clear();
            Ok(())
        })
        .await
    }

    /// Raw value of a single key, known or not.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let settings = self.load().await;
        match serde_json::to_value(settings) {
            Ok(Value::Object(mut document)) => document.remove(key),
            Ok(_) => None,
            Err(e) => {
                error!("Failed to serialize settings {e:?}");
                None
            }
        }
    }

    /// Sets a single key. Values that don't fit the expected type of a known key are rejected and
    /// the stored document stays as it was.
    pub async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.lock.lock().await;
        let current = self.read().await?;

        let Value::Object(mut document) = serde_json::to_value(&current)? else {
            bail!("Settings didn't serialize into an object");
        };
        document.insert(key.to_owned(), value.clone());

        let updated: Settings = serde_json::from_value(Value::Object(document))
            .with_context(|| format!("Invalid value {value} for setting {key}"))?;
        updated
            .validate()
            .with_context(|| format!("Invalid value {value} for setting {key}"))?;

        self.write(&updated).await?;
        info!("Updated setting {key} = {value}");
        Ok(())
    }

    /// Applies `change` to the current settings and writes the result if it's valid.
    pub async fn update<R>(&self, change: impl FnOnce(&mut Settings) -> Result<R>) -> Result<R> {
        let _guard = self.lock.lock().await;
        let mut settings = self.read().await?;
        let result = change(&mut settings)?;
        settings.validate()?;
        self.write(&settings).await?;
        Ok(result)
    }

    async fn read(&self) -> Result<Settings> {
        let Some(content) = read_locked(&self.path)
            .await
            .with_context(|| format!("Failed to read {:?}", self.path))?
        else {
            return Ok(Settings::default());
        };

        // Only a document that isn't a JSON object at all gets replaced by defaults, on the next
        // successful update.
        let document = match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(document)) => document,
            Ok(_) => {
                warn!("Settings file {:?} is not an object, using defaults", self.path);
                return Ok(Settings::default());
            }
            Err(e) => {
                warn!("Settings file {:?} is malformed, using defaults: {e}", self.path);
                return Ok(Settings::default());
            }
        };

        let mut settings = Settings::from_document(document);
        settings.sanitize();
        Ok(settings)
    }

    async fn write(&self, settings: &Settings) -> Result<()> {
        let content = serde_json::to_vec_pretty(settings)?;
        write_locked(&self.path, &content)
            .await
            .with_context(|| format!("Failed to write {:?}", self.path))
    }
}
