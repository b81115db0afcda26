//! Lock file management for single-instance enforcement.
//!
//! The lock lives at `$XDG_RUNTIME_DIR/duskbell.lock` (falling back to
//! `/tmp`) and holds the owner's PID on the first line and the custom config
//! directory, if any, on the second. Other commands read the PID from it to
//! find the running instance.

use anyhow::{Context, Result, bail};
use fs2::FileExt;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::utils;
use crate::config;

pub fn lock_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(runtime_dir).join("duskbell.lock")
}

/// An exclusively held lock file, removed again on drop.
#[derive(Debug)]
pub struct LockFile {
    file: File,
    path: PathBuf,
}

impl LockFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Acquire the single-instance lock.
///
/// A stale lock (its PID no longer running, or unreadable) is cleaned up and
/// the acquisition retried once. A live owner is an error.
pub fn acquire_lock() -> Result<LockFile> {
    acquire_lock_at(&lock_path())
}

pub fn acquire_lock_at(path: &Path) -> Result<LockFile> {
    match try_lock(path)? {
        Some(lock) => Ok(lock),
        None => {
            resolve_conflict(path)?;
            try_lock(path)?.context("Failed to acquire lock after removing a stale lock file")
        }
    }
}

fn try_lock(path: &Path) -> Result<Option<LockFile>> {
    // Keep existing content until the lock is ours
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("Failed to open lock file {}", path.display()))?;

    if file.try_lock_exclusive().is_err() {
        return Ok(None);
    }

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(file, "{}", std::process::id())?;
    match config::get_custom_config_dir() {
        Some(dir) => writeln!(file, "{}", dir.display())?,
        None => writeln!(file)?,
    }
    file.flush()?;

    Ok(Some(LockFile {
        file,
        path: path.to_path_buf(),
    }))
}

fn resolve_conflict(path: &Path) -> Result<()> {
    let Some(pid) = read_lock_pid(path) else {
        log_warning!("Lock file unreadable, removing");
        let _ = std::fs::remove_file(path);
        return Ok(());
    };

    if !utils::is_process_running(pid) {
        log_warning!("Removing stale lock file (process {pid} no longer running)");
        let _ = std::fs::remove_file(path);
        return Ok(());
    }

    log_pipe!();
    log_error!("duskbell is already running (PID: {pid})");
    log_block_start!("Did you mean to:");
    log_indented!("• Fire a test session: duskbell test");
    log_indented!("• Stop the running session: duskbell test --stop");
    bail!("another duskbell instance is running")
}

/// The PID recorded in the lock file at `path`.
pub fn read_lock_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path)
        .ok()?
        .lines()
        .next()?
        .trim()
        .parse()
        .ok()
}
