use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "timetrace-daemon", version, about = "Background tracker of TimeTrace")]
pub struct DaemonArgs {
    /// Run in the current process instead of detaching.
    #[arg(long)]
    pub force: bool,
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use tracing::level_filters::LevelFilter;

    use super::DaemonArgs;

    #[test]
    fn test_parse_daemon_args() {
        let args = DaemonArgs::parse_from([
            "timetrace-daemon",
            "--force",
            "--dir",
            "/tmp/tt",
            "--log-filter",
            "debug",
        ]);
        assert!(args.force);
        assert!(!args.log_console);
        assert_eq!(args.log, Some(LevelFilter::DEBUG));
        assert_eq!(args.dir, Some("/tmp/tt".into()));
    }
}
