//! Detection of running watched applications. [SysinfoSampler] is the production implementation,
//! the loop itself only sees [ProcessSampler].

use std::collections::{BTreeSet, HashSet};

use anyhow::Result;
use sysinfo::{ProcessesToUpdate, System};
use tracing::trace;

#[cfg(test)]
use mockall::automock;

/// Intended to serve as a contract for querying the OS process list.
#[cfg_attr(test, automock)]
pub trait ProcessSampler: Send {
    /// Returns entries of `watchlist` that have at least one running process. Matching ignores
    /// case. Processes that vanish or can't be inspected while sampling are skipped.
    fn running_apps(&mut self, watchlist: &[String]) -> Result<HashSet<String>>;
}

/// Keeps one [System] alive between samples so only the process table is refreshed.
pub struct SysinfoSampler {
    system: System,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSampler {
    /// Lower case names of every running process. Linux truncates process names, so the
    /// executable file name is included as well.
    pub fn process_names(&mut self) -> BTreeSet<String> {
        let refreshed = self.system.refresh_processes(ProcessesToUpdate::All, true);
        trace!("Refreshed {refreshed} processes");

        self.system
            .processes()
            .values()
            .flat_map(|process| {
                let exe_name = process
                    .exe()
                    .and_then(|v| v.file_name())
                    .map(|v| v.to_string_lossy().to_lowercase());
                std::iter::once(process.name().to_string_lossy().to_lowercase()).chain(exe_name)
            })
            .collect()
    }
}

impl ProcessSampler for SysinfoSampler {
    fn running_apps(&mut self, watchlist: &[String]) -> Result<HashSet<String>> {
        if watchlist.is_empty() {
            return Ok(HashSet::new());
        }
        Ok(match_watched(watchlist, self.process_names()))
    }
}

/// Windows services and drivers that are never worth watching.
pub const SYSTEM_PROCESSES: [&str; 23] = [
    "system.exe",
    "svchost.exe",
    "csrss.exe",
    "lsass.exe",
    "services.exe",
    "smss.exe",
    "explorer.exe",
    "dwm.exe",
    "searchindexer.exe",
    "nvcontainer.exe",
    "spoolsv.exe",
    "conhost.exe",
    "rundll32.exe",
    "wininit.exe",
    "taskhost.exe",
    "audiodg.exe",
    "sqlwriter.exe",
    "mysqld.exe",
    "nvidia.exe",
    "igfxem.exe",
    "igfxhk.exe",
    "amd.exe",
    "nvwmi.exe",
];

pub fn is_system_process(name: &str) -> bool {
    SYSTEM_PROCESSES.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// Returns watched entries present among `process_names`. Process names are expected in lower
/// case.
pub fn match_watched(
    watchlist: &[String],
    process_names: impl IntoIterator<Item = String>,
) -> HashSet<String> {
    let watched = watchlist
        .iter()
        .map(|v| v.trim().to_lowercase())
        .collect::<HashSet<_>>();

    process_names
        .into_iter()
        .filter(|name| watched.contains(name))
        .collect()
}
