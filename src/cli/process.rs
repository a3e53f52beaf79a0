use std::{
    env,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use sysinfo::{get_current_pid, Pid, Process, ProcessesToUpdate, Signal, System};
use tracing::{debug, info, warn};

use super::daemon_path::to_daemon_path;

pub const FLUSH_WAIT: Duration = Duration::from_millis(500);

pub fn daemon_executable() -> Result<PathBuf> {
    let cli = env::current_exe().context("Can't operate without an executable")?;
    Ok(to_daemon_path(cli))
}

/// Processes started from the `name` executable, except this one and its children.
fn find_daemons<'a>(system: &'a System, name: &Path) -> Result<Vec<(&'a Pid, &'a Process)>> {
    let current_id = get_current_pid().map_err(|e| anyhow!("Can't get current pid: {e}"))?;

    Ok(system
        .processes()
        .iter()
        .filter(|(pid, _)| **pid != current_id)
        // Linux lists threads next to processes.
        .filter(|(_, process)| process.thread_kind().is_none())
        .filter(|(_, process)| !matches!(process.parent(), Some(p) if p == current_id))
        .filter(|(_, process)| {
            process
                .exe()
                .filter(|v| v.exists())
                .filter(|v| name == *v)
                .is_some()
        })
        .collect())
}

fn refreshed_system() -> System {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    system
}

/// Terminates every process started from the `name` executable, except this one. Returns how many
/// were stopped.
pub fn kill_previous_servers(name: &Path) -> Result<usize> {
    let system = refreshed_system();
    let daemons = find_daemons(&system, name)?;
    for (pid, process) in &daemons {
        // This will forcefully terminate the process on Windows, losing time that wasn't
        // flushed yet.
        if process.kill_with(Signal::Term).is_none() {
            process.kill();
        }
        process.wait();
        info!("Stopped daemon {pid}");
    }
    Ok(daemons.len())
}

/// Sends the flush signal to every daemon started from `name`. Returns how many received it.
pub fn signal_flush(name: &Path) -> Result<usize> {
    let system = refreshed_system();
    let mut signaled = 0;
    for (pid, process) in find_daemons(&system, name)? {
        match process.kill_with(Signal::User1) {
            Some(true) => {
                debug!("Asked daemon {pid} to flush");
                signaled += 1;
            }
            Some(false) => warn!("Failed to signal daemon {pid}"),
            None => debug!("Flush signal isn't supported on this platform"),
        }
    }
    Ok(signaled)
}

/// Asks running daemons to save pending time, then gives them [FLUSH_WAIT] to finish writing.
pub async fn request_flush(name: &Path) -> Result<usize> {
    let signaled = signal_flush(name)?;
    if signaled > 0 {
        tokio::time::sleep(FLUSH_WAIT).await;
    }
    Ok(signaled)
}

/// Shuts down previous daemons and starts a new one. The daemon binary detaches itself, so this
/// only waits for the launcher to exit.
pub fn restart_server(dir: Option<&Path>) -> Result<()> {
    let daemon = daemon_executable()?;
    if !daemon.exists() {
        bail!("Daemon executable {daemon:?} not found");
    }
    kill_previous_servers(&daemon)?;

    let mut command = std::process::Command::new(&daemon);
    if let Some(dir) = dir {
        command.arg("--dir").arg(dir);
    }
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());

    info!("Spawning {daemon:?}");
    let status = command.status()?;
    if !status.success() {
        bail!("Daemon launcher exited with {status}");
    }
    Ok(())
}
