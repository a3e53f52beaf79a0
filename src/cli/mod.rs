pub mod daemon_path;
pub mod output;
pub mod process;
pub mod settings;
pub mod stats;

use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use process::{daemon_executable, kill_previous_servers, request_flush, restart_server};
use settings::{
    process_config_command, process_running_command, process_threshold_command,
    process_watch_command, ConfigCommand, ThresholdCommand, WatchCommand,
};
use stats::{process_export_command, process_stats_command, ExportCommand, StatsCommand};
use tracing::{debug, level_filters::LevelFilter, warn};

use crate::{
    daemon::{
        start_daemon,
        storage::{
            settings::SettingsStore,
            usage_store::{retention_cutoff, SqliteUsageStore, UsageStore},
        },
    },
    utils::{
        dir::{database_path, resolve_application_path, settings_path, LOGS_DIR},
        logging::{enable_logging, CLI_PREFIX},
    },
};

const DEFAULT_RETENTION_DAYS: u64 = 90;

#[derive(Parser, Debug)]
#[command(name = "TimeTrace", version, long_about = None)]
#[command(about = "Tracks how long watched applications run and warns about daily limits", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application")]
    Init,
    #[command(
        about = "Run a daemon directly in current console. Used for debugging"
    )]
    Serve,
    #[command(about = "Stop currently running daemon.")]
    Stop,
    #[command(about = "Manage watched executables")]
    Watch {
        #[command(subcommand)]
        command: WatchCommand,
    },
    #[command(about = "List running processes by category, watched ones are marked with *")]
    Running,
    #[command(about = "Display usage per app for a period")]
    Stats {
        #[command(flatten)]
        command: StatsCommand,
    },
    #[command(about = "Write usage per app for a period into a CSV file")]
    Export {
        #[command(flatten)]
        command: ExportCommand,
    },
    #[command(about = "Manage daily usage limits")]
    Threshold {
        #[command(subcommand)]
        command: ThresholdCommand,
    },
    #[command(about = "Read or change settings")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    #[command(about = "Delete usage older than the given amount of days")]
    Purge {
        #[arg(long, default_value_t = DEFAULT_RETENTION_DAYS)]
        days: u64,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();
    let app_dir = resolve_application_path(args.dir)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &app_dir.join(LOGS_DIR), logging_level, args.log)?;

    match args.commands {
        Commands::Init => {
            restart_server(Some(&app_dir))?;
            println!("Daemon started");
            Ok(())
        }
        Commands::Stop => {
            let stopped = kill_previous_servers(&daemon_executable()?)?;
            println!("Stopped {stopped} daemon(s)");
            Ok(())
        }
        Commands::Serve => start_daemon(app_dir).await,
        Commands::Watch { command } => {
            process_watch_command(&open_settings(&app_dir).await?, command).await
        }
        Commands::Running => process_running_command(&open_settings(&app_dir).await?).await,
        Commands::Stats { command } => {
            flush_daemons().await;
            process_stats_command(&open_store(&app_dir)?, command).await
        }
        Commands::Export { command } => {
            flush_daemons().await;
            process_export_command(&open_store(&app_dir)?, command).await
        }
        Commands::Threshold { command } => {
            process_threshold_command(&open_settings(&app_dir).await?, command).await
        }
        Commands::Config { command } => {
            process_config_command(&open_settings(&app_dir).await?, command).await
        }
        Commands::Purge { days } => {
            let today = Local::now().date_naive();
            let deleted = open_store(&app_dir)?.purge_retaining(today, days).await?;
            println!(
                "Deleted {deleted} records older than {}",
                retention_cutoff(today, days)
            );
            Ok(())
        }
    }
}

/// Lets running daemons save the time they hold in memory before totals are read. Stored totals
/// are still shown when no daemon can be reached.
async fn flush_daemons() {
    let flushed = match daemon_executable() {
        Ok(daemon) => request_flush(&daemon).await,
        Err(e) => Err(e),
    };
    match flushed {
        Ok(count) => debug!("Asked {count} daemon(s) to flush"),
        Err(e) => warn!("Couldn't ask the daemon to flush {e:?}"),
    }
}

async fn open_settings(app_dir: &std::path::Path) -> Result<SettingsStore> {
    SettingsStore::open(settings_path(app_dir)).await
}

fn open_store(app_dir: &std::path::Path) -> Result<SqliteUsageStore> {
    SqliteUsageStore::new(database_path(app_dir))
}
