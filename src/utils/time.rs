use anyhow::{Context, Result};
use chrono::{Days, NaiveDate, NaiveTime};

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";
const CLOCK_TIME_FORMAT: &str = "%H:%M";

/// This is the standard way of converting a date to a string in timetrace. The usage table stores
/// dates in this format, so lexicographic order equals chronological order.
pub fn date_to_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

/// Parses "HH:MM" strings used by quiet hours.
pub fn parse_clock_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), CLOCK_TIME_FORMAT)
        .with_context(|| format!("{value:?} is not a valid HH:MM time"))
}

/// Returns the date `days` days before `date`, saturating at the earliest representable date.
pub fn days_before(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days))
        .unwrap_or(NaiveDate::MIN)
}

pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds / 60) % 60;
    let seconds = seconds % 60;
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;

    #[test]
    fn test_date_key() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(date_to_key(date), "2024-01-01");
    }

    #[test]
    fn test_parse_clock_time() {
        assert_eq!(
            parse_clock_time("22:00").unwrap(),
            NaiveTime::from_hms_opt(22, 0, 0).unwrap()
        );
        assert_eq!(
            parse_clock_time(" 07:30").unwrap(),
            NaiveTime::from_hms_opt(7, 30, 0).unwrap()
        );
        assert!(parse_clock_time("25:00").is_err());
        assert!(parse_clock_time("evening").is_err());
    }

    #[test]
    fn test_days_before() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(days_before(date, 1), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(days_before(date, 0), date);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(5), "5s");
        assert_eq!(format_duration(65), "1m5s");
        assert_eq!(format_duration(3600 * 2 + 61), "2h1m1s");
    }
}
