use std::io::{self, Write};

use crate::daemon::storage::entities::AppUsage;

pub const CSV_HEADER: &str = "Application,Hours";

/// Quotes a field when it contains a separator, a quote or a line break.
pub fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

/// Writes one row per app with hours rounded to two decimal places.
pub fn write_csv(usages: &[AppUsage], mut writer: impl Write) -> io::Result<()> {
    writeln!(writer, "{CSV_HEADER}")?;
    for usage in usages {
        writeln!(writer, "{},{:.2}", escape_field(&usage.app_name), usage.hours())?;
    }
    writer.flush()
}
