use std::{
    env, io,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};

pub const SETTINGS_FILE: &str = "settings.json";
pub const DATABASE_FILE: &str = "tracker.db";
pub const LOGS_DIR: &str = "logs";

pub fn create_application_default_path() -> Result<PathBuf> {
    let path = {
        #[cfg(windows)]
        {
            let mut path = env::var("APPDATA")
                .map(PathBuf::from)
                .map_err(|_| anyhow!("APPDATA should be present on Windows"))?;
            path.push("timetrace");
            path
        }
        #[cfg(not(windows))]
        {
            let mut path = env::var("XDG_STATE_HOME")
                .map(PathBuf::from)
                .or_else(|_| {
                    env::var("HOME").map(|home| {
                        let mut path = PathBuf::from(home);
                        path.push(".local/state");
                        path
                    })
                })
                .map_err(|_| anyhow!("Couldn't find neither XDG_STATE_HOME nor HOME"))?;
            path.push("timetrace");
            path
        }
    };

    ensure_dir(path)
}

/// Uses `dir` when given, the default application directory otherwise. The result is absolute, the
/// daemon changes its working directory.
pub fn resolve_application_path(dir: Option<PathBuf>) -> Result<PathBuf> {
    match dir {
        Some(dir) => ensure_dir(std::path::absolute(dir)?),
        None => create_application_default_path(),
    }
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}

pub fn settings_path(app_dir: &Path) -> PathBuf {
    app_dir.join(SETTINGS_FILE)
}

pub fn database_path(app_dir: &Path) -> PathBuf {
    app_dir.join(DATABASE_FILE)
}
