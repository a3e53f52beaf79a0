use std::path::PathBuf;

pub const DAEMON_BINARY: &str = "timetrace-daemon";

/// The daemon binary is installed next to the cli one.
pub fn to_daemon_path(mut path: PathBuf) -> PathBuf {
    path.set_file_name(DAEMON_BINARY);
    #[cfg(windows)]
    {
        path.set_extension("exe");
    }
    path
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::to_daemon_path;

    #[test]
    fn test_daemon_lives_next_to_cli() {
        let daemon = to_daemon_path(PathBuf::from("/usr/local/bin/timetrace"));
        assert_eq!(daemon.parent(), Some(PathBuf::from("/usr/local/bin").as_path()));
        assert!(daemon
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("timetrace-daemon"));
    }
}
