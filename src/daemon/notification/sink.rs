use anyhow::Result;
use notify_rust::{Notification, Timeout};

#[cfg(test)]
use mockall::automock;

const NOTIFICATION_TITLE: &str = "TimeTrace - usage warning";
const NOTIFICATION_TIMEOUT_MS: u32 = 10_000;

/// Usage of an app crossed its daily limit.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageAlert {
    pub app_name: String,
    pub used_seconds: u64,
    pub threshold_hours: f64,
}

impl UsageAlert {
    pub fn message(&self) -> String {
        let name = self
            .app_name
            .strip_suffix(".exe")
            .unwrap_or(&self.app_name);
        let hours = self.used_seconds / 3600;
        let minutes = (self.used_seconds % 3600) / 60;
        format!("You have used {name} for {hours}h {minutes}m today")
    }
}

/// Delivers alerts to the user.
#[cfg_attr(test, automock)]
pub trait NotificationSink: Send {
    fn notify(&mut self, alert: &UsageAlert) -> Result<()>;
}

pub struct DesktopNotifier;

impl NotificationSink for DesktopNotifier {
    fn notify(&mut self, alert: &UsageAlert) -> Result<()> {
        Notification::new()
            .summary(NOTIFICATION_TITLE)
            .body(&alert.message())
            .appname(env!("CARGO_PKG_NAME"))
            .timeout(Timeout::Milliseconds(NOTIFICATION_TIMEOUT_MS))
            .show()?;
        Ok(())
    }
}
