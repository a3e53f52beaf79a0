use std::{collections::HashSet, fmt::Display, fs::File, io::BufWriter, path::PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};
use tracing::info;

use crate::{
    daemon::storage::{
        entities::{AppUsage, StatsRange},
        usage_store::UsageStore,
    },
    utils::percentage::Percentage,
};

use super::{
    output::{csv::write_csv, print_stats},
    Args,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RangeOption {
    Today,
    Week,
    Month,
}

impl Display for RangeOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeOption::Today => write!(f, "today"),
            RangeOption::Week => write!(f, "week"),
            RangeOption::Month => write!(f, "month"),
        }
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct RangeArgs {
    #[arg(long, short, default_value_t = RangeOption::Today, help = "Predefined period. Week and month are the last 7 and 30 days, today included")]
    range: RangeOption,
    #[arg(
        long = "start",
        short,
        help = "First day of a custom period. Examples are \"yesterday\", \"15/03/2025\", \"last monday\". Overrides --range"
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "Last day of a custom period, today when omitted. Requires --start"
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

#[derive(Debug, Parser)]
pub struct StatsCommand {
    #[command(flatten)]
    range: RangeArgs,
    #[arg(short = 'p', long = "percentage", help = "Filter apps to have at least specified percentage", default_value_t = Percentage::ZERO)]
    min_percentage: Percentage,
}

#[derive(Debug, Parser)]
pub struct ExportCommand {
    #[arg(long, short, help = "File the CSV is written to")]
    output: PathBuf,
    #[command(flatten)]
    range: RangeArgs,
}

fn validation_error(message: String) -> anyhow::Error {
    Args::command()
        .error(clap::error::ErrorKind::ValueValidation, message)
        .into()
}

fn parse_day(value: &str, now: DateTime<Local>, dialect: chrono_english::Dialect) -> Result<NaiveDate> {
    parse_date_string(value, now, dialect)
        .map(|v| v.with_timezone(&Local).date_naive())
        .map_err(|e| validation_error(format!("Failed to validate date {value:?}: {e}")))
}

/// Turns command line options into a range. A custom period wins over `--range`.
pub fn resolve_range(args: &RangeArgs, now: DateTime<Local>) -> Result<StatsRange> {
    let dialect: chrono_english::Dialect = args.date_style.into();
    match (&args.start_date, &args.end_date) {
        (Some(start), end) => {
            let start = parse_day(start, now, dialect)?;
            let end = match end {
                Some(end) => parse_day(end, now, dialect)?,
                None => now.date_naive(),
            };
            if start > end {
                return Err(validation_error(format!(
                    "Start {start} is after end {end}"
                )));
            }
            Ok(StatsRange::Custom { start, end })
        }
        (None, Some(_)) => Err(validation_error("--end requires --start".into())),
        (None, None) => Ok(match args.range {
            RangeOption::Today => StatsRange::Today,
            RangeOption::Week => StatsRange::Week,
            RangeOption::Month => StatsRange::Month,
        }),
    }
}

fn describe(range: StatsRange, today: NaiveDate) -> String {
    let (start, end) = range.bounds(today);
    if start == end {
        format!("Usage on {start}")
    } else {
        format!("Usage from {start} to {end}")
    }
}

async fn load_range(
    store: &impl UsageStore,
    range: &RangeArgs,
) -> Result<(StatsRange, NaiveDate, Vec<AppUsage>)> {
    let now = Local::now();
    let range = resolve_range(range, now)?;
    let today = now.date_naive();
    let usages = store.stats_for_range(range, today).await?;
    Ok((range, today, usages))
}

/// Command to process `stats`. Reads totals already flushed by the daemon, so the last
/// `save_interval` of activity may be missing.
pub async fn process_stats_command(store: &impl UsageStore, command: StatsCommand) -> Result<()> {
    let (range, today, usages) = load_range(store, &command.range).await?;
    print_stats(&describe(range, today), &usages, command.min_percentage);
    Ok(())
}

/// Appends apps that were tracked at some point but have no usage in the period, so an export
/// lists every tracked app.
pub fn with_idle_apps(mut usages: Vec<AppUsage>, tracked: Vec<String>) -> Vec<AppUsage> {
    let present = usages
        .iter()
        .map(|v| v.app_name.clone())
        .collect::<HashSet<_>>();
    usages.extend(
        tracked
            .into_iter()
            .filter(|app| !present.contains(app.as_str()))
            .map(|app| AppUsage::new(app, 0)),
    );
    usages
}

pub async fn process_export_command(store: &impl UsageStore, command: ExportCommand) -> Result<()> {
    let (_, _, usages) = load_range(store, &command.range).await?;
    let usages = with_idle_apps(usages, store.tracked_apps().await?);
    let file = File::create(&command.output)
        .with_context(|| format!("Failed to create {:?}", command.output))?;
    write_csv(&usages, BufWriter::new(file))
        .with_context(|| format!("Failed to write {:?}", command.output))?;
    info!("Exported {} apps to {:?}", usages.len(), command.output);
    println!("Exported {} apps to {}", usages.len(), command.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Local, NaiveDate, TimeZone};

    use super::{resolve_range, with_idle_apps, DateStyle, RangeArgs, RangeOption};
    use crate::daemon::storage::entities::{AppUsage, StatsRange};

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 20, 15, 0, 0).unwrap()
    }

    fn args(range: RangeOption, start: Option<&str>, end: Option<&str>) -> RangeArgs {
        RangeArgs {
            range,
            start_date: start.map(Into::into),
            end_date: end.map(Into::into),
            date_style: DateStyle::Uk,
        }
    }

    #[test]
    fn test_predefined_ranges() {
        assert_eq!(
            resolve_range(&args(RangeOption::Week, None, None), now()).unwrap(),
            StatsRange::Week
        );
        assert_eq!(
            resolve_range(&args(RangeOption::Today, None, None), now()).unwrap(),
            StatsRange::Today
        );
    }

    #[test]
    fn test_custom_range_overrides_predefined() {
        let range =
            resolve_range(&args(RangeOption::Month, Some("15/03/2025"), Some("yesterday")), now())
                .unwrap();
        assert_eq!(
            range,
            StatsRange::Custom {
                start: NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
                end: NaiveDate::from_ymd_opt(2025, 3, 19).unwrap(),
            }
        );
    }

    #[test]
    fn test_custom_range_ends_today_by_default() {
        let range = resolve_range(&args(RangeOption::Today, Some("17/03/2025"), None), now()).unwrap();
        assert_eq!(
            range,
            StatsRange::Custom {
                start: NaiveDate::from_ymd_opt(2025, 3, 17).unwrap(),
                end: NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
            }
        );
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(resolve_range(&args(RangeOption::Today, None, Some("yesterday")), now()).is_err());
        assert!(
            resolve_range(&args(RangeOption::Today, Some("19/03/2025"), Some("15/03/2025")), now())
                .is_err()
        );
        assert!(resolve_range(&args(RangeOption::Today, Some("someday"), None), now()).is_err());
    }

    #[test]
    fn test_idle_apps_are_listed_last() {
        let usages = vec![AppUsage::new("code.exe", 60)];
        let tracked = vec!["chrome.exe".to_string(), "code.exe".to_string()];

        assert_eq!(
            with_idle_apps(usages, tracked),
            vec![AppUsage::new("code.exe", 60), AppUsage::new("chrome.exe", 0)]
        );
    }
}
