//! Rendering of usage statistics for the terminal and for files.

pub mod categories;
pub mod csv;

use ansi_term::Style;

use crate::{
    daemon::storage::entities::{total_seconds, AppUsage},
    utils::{
        percentage::{seconds_percentage, Percentage},
        time::format_duration,
    },
};

/// One line of the stats table. Apps below `min_percentage` of the total are left out.
pub fn stats_lines(usages: &[AppUsage], min_percentage: Percentage) -> Vec<String> {
    let total = total_seconds(usages);
    usages
        .iter()
        .filter_map(|usage| {
            let share = seconds_percentage(usage.seconds, total);
            (share >= min_percentage).then(|| {
                format!(
                    "{}%\t{}\t{}",
                    share.round() as i32,
                    format_duration(usage.seconds),
                    usage.app_name
                )
            })
        })
        .collect()
}

pub fn print_stats(title: &str, usages: &[AppUsage], min_percentage: Percentage) {
    println!("{}", Style::new().bold().paint(title));
    if usages.is_empty() {
        println!("No usage recorded");
        return;
    }
    for line in stats_lines(usages, min_percentage) {
        println!("{line}");
    }
    println!(
        "{}",
        Style::new()
            .dimmed()
            .paint(format!("Total\t{}", format_duration(total_seconds(usages))))
    );
}
