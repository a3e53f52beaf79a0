//! Groups running process names into broad categories for the `running` listing.

use std::{collections::BTreeMap, fmt::Display};

/// Declaration order is the order categories are printed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AppCategory {
    Games,
    Browsers,
    Communication,
    Office,
    Media,
    Development,
    Other,
}

impl AppCategory {
    const KNOWN: [AppCategory; 6] = [
        AppCategory::Games,
        AppCategory::Browsers,
        AppCategory::Communication,
        AppCategory::Office,
        AppCategory::Media,
        AppCategory::Development,
    ];

    fn apps(self) -> &'static [&'static str] {
        match self {
            AppCategory::Games => &[
                "valorant.exe",
                "leagueclient.exe",
                "riotclientservices.exe",
                "csgo.exe",
                "dota2.exe",
                "elden ring.exe",
                "minecraft.exe",
                "fortnite.exe",
                "apex.exe",
                "overwatch2.exe",
            ],
            AppCategory::Browsers => &[
                "chrome.exe",
                "firefox.exe",
                "msedge.exe",
                "brave.exe",
                "opera.exe",
                "vivaldi.exe",
                "chromium.exe",
                "iexplore.exe",
            ],
            AppCategory::Communication => &[
                "discord.exe",
                "telegram.exe",
                "slack.exe",
                "whatsapp.exe",
                "skype.exe",
                "zoom.exe",
                "teams.exe",
                "messenger.exe",
            ],
            AppCategory::Office => &[
                "notepad.exe",
                "notepad++.exe",
                "code.exe",
                "winword.exe",
                "excel.exe",
                "powerpnt.exe",
                "adobephotoshop.exe",
                "gimp.exe",
            ],
            AppCategory::Media => &[
                "spotify.exe",
                "vlc.exe",
                "audacity.exe",
                "obs64.exe",
                "blender.exe",
                "clip studio.exe",
                "aseprite.exe",
            ],
            AppCategory::Development => &[
                "pycharm64.exe",
                "clion64.exe",
                "idea64.exe",
                "visual studio.exe",
                "git.exe",
                "docker.exe",
                "nodejs.exe",
                "java.exe",
            ],
            AppCategory::Other => &[],
        }
    }
}

impl Display for AppCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AppCategory::Games => "Games",
            AppCategory::Browsers => "Browsers",
            AppCategory::Communication => "Communication",
            AppCategory::Office => "Text & Office",
            AppCategory::Media => "Media & Design",
            AppCategory::Development => "Development",
            AppCategory::Other => "Other",
        };
        f.write_str(name)
    }
}

/// Category of a lower case process name. Names without the `.exe` suffix, as reported on Linux
/// and macOS, match the same entries.
pub fn categorize(name: &str) -> AppCategory {
    let with_suffix = format!("{name}.exe");
    AppCategory::KNOWN
        .into_iter()
        .find(|category| {
            category
                .apps()
                .iter()
                .any(|app| *app == name || *app == with_suffix)
        })
        .unwrap_or(AppCategory::Other)
}

/// Lines of the `running` listing. Each non-empty category gets a header followed by its apps in
/// name order, watched apps are marked with `*`.
pub fn running_lines<'a>(
    processes: impl IntoIterator<Item = &'a str>,
    watchlist: &[String],
) -> Vec<String> {
    let mut grouped = BTreeMap::<AppCategory, Vec<&str>>::new();
    for name in processes {
        grouped.entry(categorize(name)).or_default().push(name);
    }

    let mut lines = vec![];
    for (category, mut apps) in grouped {
        apps.sort_unstable();
        lines.push(category.to_string());
        for app in apps {
            let marker = if watchlist.iter().any(|v| v == app) {
                "*"
            } else {
                " "
            };
            lines.push(format!("{marker} {app}"));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::{categorize, running_lines, AppCategory};

    #[test]
    fn test_categorize() {
        assert_eq!(categorize("valorant.exe"), AppCategory::Games);
        assert_eq!(categorize("firefox"), AppCategory::Browsers);
        assert_eq!(categorize("clip studio.exe"), AppCategory::Media);
        assert_eq!(categorize("java"), AppCategory::Development);
        assert_eq!(categorize("bash"), AppCategory::Other);
    }

    #[test]
    fn test_running_lines_grouped_in_category_order() {
        let watchlist = vec!["discord.exe".to_string()];

        let lines = running_lines(
            ["zsh", "discord.exe", "code", "chrome.exe", "alacritty", "slack.exe"],
            &watchlist,
        );

        assert_eq!(
            lines,
            vec![
                "Browsers",
                "  chrome.exe",
                "Communication",
                "* discord.exe",
                "  slack.exe",
                "Text & Office",
                "  code",
                "Other",
                "  alacritty",
                "  zsh",
            ]
        );
    }

    #[test]
    fn test_running_lines_empty() {
        assert!(running_lines([], &[]).is_empty());
    }
}
