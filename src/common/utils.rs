//! Small formatting and process helpers shared across modules.

use std::path::Path;

/// Render a countdown as `MM:SS`, the way the banner shows it.
///
/// Minutes are not wrapped into hours; a 75 minute countdown reads `75:00`.
pub fn format_countdown(remaining_secs: u64) -> String {
    format!("{:02}:{:02}", remaining_secs / 60, remaining_secs % 60)
}

/// Render a span as `Xm Ys` for log lines.
pub fn format_minutes_seconds(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{}m {}s", secs / 60, secs % 60)
}

/// Replace the home directory prefix with `~` so logs don't leak user names.
pub fn private_path(path: &Path) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        return format!("~/{}", stripped.display());
    }
    path.display().to_string()
}

/// Check if a process with the given PID is still running.
pub fn is_process_running(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

/// Look up an executable on `PATH` (or accept an explicit path).
pub fn find_executable(name: &str) -> Option<std::path::PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(name))
            .find(|full| full.is_file())
    })
}
