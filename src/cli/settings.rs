use anyhow::Result;
use clap::Subcommand;
use serde_json::Value;

use crate::{
    cli::output::categories::running_lines,
    daemon::{
        collection::sampler::{is_system_process, SysinfoSampler},
        notification::thresholds::{
            default_thresholds, reset_thresholds, set_threshold, threshold_for,
        },
        storage::settings::SettingsStore,
    },
};

#[derive(Subcommand, Debug)]
pub enum WatchCommand {
    #[command(about = "Start tracking an executable, e.g. chrome.exe")]
    Add { app: String },
    #[command(about = "Stop tracking an executable. Recorded usage is kept")]
    Remove { app: String },
    #[command(about = "List tracked executables")]
    List,
    #[command(about = "Remove every executable from the watchlist")]
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum ThresholdCommand {
    #[command(about = "Set the daily limit of an app in hours")]
    Set { app: String, hours: f64 },
    #[command(about = "Show the daily limit of an app, or every configured limit")]
    Get { app: Option<String> },
    #[command(about = "Replace configured limits with the built-in table")]
    Reset,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    #[command(about = "Show one setting, or the whole document")]
    Get { key: Option<String> },
    #[command(about = "Change one setting. The value is read as JSON, falling back to a plain string")]
    Set { key: String, value: String },
}

pub async fn process_watch_command(settings: &SettingsStore, command: WatchCommand) -> Result<()> {
    match command {
        WatchCommand::Add { app } => println!("{}", settings.add_app(&app).await?),
        WatchCommand::Remove { app } => println!("{}", settings.remove_app(&app).await?),
        WatchCommand::List => {
            let watchlist = settings.watchlist().await;
            if watchlist.is_empty() {
                println!("Watchlist is empty");
            }
            for app in watchlist {
                println!("{app}");
            }
        }
        WatchCommand::Clear => {
            settings.clear_watchlist().await?;
            println!("Watchlist cleared");
        }
    }
    Ok(())
}

pub async fn process_threshold_command(
    settings: &SettingsStore,
    command: ThresholdCommand,
) -> Result<()> {
    match command {
        ThresholdCommand::Set { app, hours } => {
            set_threshold(settings, &app, hours).await?;
            println!("{} limited to {hours}h per day", app.trim());
        }
        ThresholdCommand::Get { app: Some(app) } => {
            let current = settings.load().await;
            println!("{app}\t{}h", threshold_for(&current, &app));
        }
        ThresholdCommand::Get { app: None } => {
            let current = settings.load().await;
            let thresholds = current
                .notification_thresholds
                .unwrap_or_else(default_thresholds);
            for (app, hours) in thresholds {
                println!("{app}\t{hours}h");
            }
        }
        ThresholdCommand::Reset => {
            reset_thresholds(settings).await?;
            println!("Limits reset to defaults");
        }
    }
    Ok(())
}

/// Values that aren't valid JSON are stored as strings, so `config set theme light` works
/// without quoting.
pub fn parse_config_value(value: &str) -> Value {
    serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()))
}

pub async fn process_config_command(settings: &SettingsStore, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Get { key: Some(key) } => match settings.get(&key).await {
            Some(value) => println!("{value}"),
            None => println!("{key} is not set"),
        },
        ConfigCommand::Get { key: None } => {
            println!("{}", serde_json::to_string_pretty(&settings.load().await)?);
        }
        ConfigCommand::Set { key, value } => {
            let value = parse_config_value(&value);
            settings.set(&key, value.clone()).await?;
            println!("{key} = {value}");
        }
    }
    Ok(())
}

/// Prints running processes that could be added to the watchlist, grouped by category.
pub async fn process_running_command(settings: &SettingsStore) -> Result<()> {
    let watchlist = settings.watchlist().await;
    let processes = tokio::task::spawn_blocking(|| SysinfoSampler::new().process_names()).await?;
    let lines = running_lines(
        processes
            .iter()
            .map(String::as_str)
            .filter(|v| !is_system_process(v)),
        &watchlist,
    );
    if lines.is_empty() {
        println!("No running applications found");
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}
