//! Finding and signalling the running duskbell instance.

use anyhow::Result;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use crate::common::utils;
use crate::io::lock;
use crate::io::signals::{DiagnosticRequest, write_request};

/// The PID of the running instance, if the lock names a live process.
///
/// A custom config directory recorded in the lock is adopted by this process
/// so follow-up commands read the same configuration.
pub fn get_running_instance_pid() -> Result<u32> {
    let path = lock::lock_path();
    let contents = std::fs::read_to_string(&path).unwrap_or_default();
    let mut lines = contents.lines();

    let pid = lines
        .next()
        .and_then(|line| line.trim().parse::<u32>().ok())
        .filter(|pid| utils::is_process_running(*pid))
        .ok_or_else(|| anyhow::anyhow!("No duskbell instance running"))?;

    if let Some(dir) = lines.next().map(str::trim).filter(|dir| !dir.is_empty()) {
        let _ = crate::config::set_config_dir(Some(dir.to_string()));
    }

    Ok(pid)
}

/// Send a reload signal (SIGUSR2) to a running instance.
pub fn send_reload_signal(pid: u32) -> Result<()> {
    kill(Pid::from_raw(pid as i32), Signal::SIGUSR2)
        .map_err(|e| anyhow::anyhow!("Failed to send reload signal: {e}"))
}

/// Hand `request` to the instance and wake it with SIGUSR1.
pub fn send_request(pid: u32, request: DiagnosticRequest) -> Result<()> {
    write_request(pid, request)?;
    kill(Pid::from_raw(pid as i32), Signal::SIGUSR1)
        .map_err(|e| anyhow::anyhow!("Failed to send {} request: {e}", request.as_str()))
}
