use chrono::NaiveTime;
use tracing::warn;

use crate::{
    daemon::storage::settings::{clock_setting, Settings},
    utils::time::parse_clock_time,
};

/// Time-of-day window during which alerts are suppressed. Both ends are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietHours {
    start: NaiveTime,
    end: NaiveTime,
}

impl QuietHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Reads the window from settings. Missing or unparsable bounds disable quiet hours.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        let (Some(start), Some(end)) = (
            clock_setting(&settings.quiet_hours_start),
            clock_setting(&settings.quiet_hours_end),
        ) else {
            return None;
        };
        match (parse_clock_time(start), parse_clock_time(end)) {
            (Ok(start), Ok(end)) => Some(Self::new(start, end)),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Ignoring quiet hours {start}-{end}: {e}");
                None
            }
        }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start < self.end {
            self.start <= time && time <= self.end
        } else {
            // The window crosses midnight. Equal bounds cover the whole day.
            time >= self.start || time <= self.end
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::QuietHours;
    use crate::daemon::storage::settings::Settings;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_window_crossing_midnight() {
        let quiet = QuietHours::new(time(22, 0), time(7, 0));

        assert!(quiet.contains(time(23, 30)));
        assert!(quiet.contains(time(2, 0)));
        assert!(quiet.contains(time(22, 0)));
        assert!(quiet.contains(time(7, 0)));
        assert!(!quiet.contains(time(12, 0)));
        assert!(!quiet.contains(time(7, 1)));
    }

    #[test]
    fn test_window_within_day() {
        let quiet = QuietHours::new(time(13, 0), time(14, 30));

        assert!(quiet.contains(time(13, 45)));
        assert!(!quiet.contains(time(12, 59)));
        assert!(!quiet.contains(time(23, 0)));
    }

    #[test]
    fn test_from_settings() {
        let mut settings = Settings {
            quiet_hours_start: Some("22:00".into()),
            quiet_hours_end: Some("07:00".into()),
            ..Settings::default()
        };
        assert_eq!(
            QuietHours::from_settings(&settings),
            Some(QuietHours::new(time(22, 0), time(7, 0)))
        );

        settings.quiet_hours_end = None;
        assert_eq!(QuietHours::from_settings(&settings), None);

        settings.quiet_hours_end = Some("later".into());
        assert_eq!(QuietHours::from_settings(&settings), None);

        settings.quiet_hours_end = Some("".into());
        assert_eq!(QuietHours::from_settings(&settings), None);
    }
}
