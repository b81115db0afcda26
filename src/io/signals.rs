//! Signal handling and the diagnostic request channel.
//!
//! Signals are turned into [`Event`]s on a dedicated thread and delivered on
//! the same channel the scheduler's workers use, so the runtime loop has a
//! single receiver to wait on.
//!
//! - SIGUSR1: a diagnostic request (`trigger` or `stop`) left in a PID-scoped
//!   request file by `duskbell test`
//! - SIGUSR2: reload the configuration
//! - SIGINT, SIGTERM, SIGHUP: shut down

use anyhow::{Context, Result, bail};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1, SIGUSR2},
    iterator::Signals,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::Arc;
use std::thread;

use crate::core::events::Event;

/// What `duskbell test` asks a running instance to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticRequest {
    Trigger,
    Stop,
}

impl DiagnosticRequest {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticRequest::Trigger => "trigger",
            DiagnosticRequest::Stop => "stop",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "trigger" => Some(DiagnosticRequest::Trigger),
            "stop" => Some(DiagnosticRequest::Stop),
            _ => None,
        }
    }

    pub fn into_event(self) -> Event {
        match self {
            DiagnosticRequest::Trigger => Event::ManualTrigger,
            DiagnosticRequest::Stop => Event::ForceStop,
        }
    }
}

pub fn request_path(pid: u32) -> PathBuf {
    std::env::temp_dir().join(format!("duskbell-request-{pid}.tmp"))
}

/// Leave a request for the instance running as `pid`.
pub fn write_request(pid: u32, request: DiagnosticRequest) -> Result<()> {
    let path = request_path(pid);
    std::fs::write(&path, request.as_str())
        .with_context(|| format!("Failed to write request file {}", path.display()))
}

/// Read and remove this process's pending request.
pub fn take_request(pid: u32) -> Result<DiagnosticRequest> {
    let path = request_path(pid);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("No request file at {}", path.display()))?;
    let _ = std::fs::remove_file(&path);
    match DiagnosticRequest::parse(&content) {
        Some(request) => Ok(request),
        None => bail!("Unknown request '{}'", content.trim()),
    }
}

/// Signal handling state shared between threads
pub struct SignalState {
    /// Cleared once a shutdown signal arrived
    pub running: Arc<AtomicBool>,
    pub receiver: Receiver<Event>,
    /// Handed to every producer of events
    pub sender: Sender<Event>,
}

impl SignalState {
    /// A channel with no signal thread attached, for simulations and tests.
    pub fn detached() -> Self {
        let (sender, receiver) = channel();
        Self {
            running: Arc::new(AtomicBool::new(true)),
            receiver,
            sender,
        }
    }
}

pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let state = SignalState::detached();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR1, SIGUSR2])
        .context("failed to register signal handlers")?;

    let running = Arc::clone(&state.running);
    let sender = state.sender.clone();

    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            for sig in signals.forever() {
                let event = match sig {
                    SIGUSR1 => match take_request(std::process::id()) {
                        Ok(request) => {
                            log_pipe!();
                            log_info!("Received diagnostic request: {}", request.as_str());
                            request.into_event()
                        }
                        Err(e) => {
                            log_pipe!();
                            log_warning!("Ignoring SIGUSR1: {e}");
                            continue;
                        }
                    },
                    SIGUSR2 => {
                        log_pipe!();
                        log_info!("Received configuration reload signal");
                        Event::Reload
                    }
                    _ => {
                        log_pipe!();
                        match sig {
                            SIGINT if debug_enabled => {
                                log_info!("Received SIGINT (Ctrl+C), shutting down...")
                            }
                            SIGHUP => log_info!("Terminal disconnected, shutting down..."),
                            _ => log_info!("Received termination request, shutting down..."),
                        }
                        running.store(false, Ordering::SeqCst);
                        let _ = sender.send(Event::Shutdown);
                        break;
                    }
                };

                if sender.send(event).is_err() {
                    break;
                }
            }
        })
        .context("failed to spawn signal handler thread")?;

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_request_parse() {
        assert_eq!(DiagnosticRequest::parse("trigger\n"), Some(DiagnosticRequest::Trigger));
        assert_eq!(DiagnosticRequest::parse("stop"), Some(DiagnosticRequest::Stop));
        assert_eq!(DiagnosticRequest::parse("6500"), None);
    }

    #[test]
    #[serial]
    fn test_request_file_is_consumed() {
        // A PID that cannot belong to a live process in the test run
        let pid = u32::MAX - 7;
        write_request(pid, DiagnosticRequest::Stop).unwrap();
        assert_eq!(take_request(pid).unwrap(), DiagnosticRequest::Stop);
        assert!(take_request(pid).is_err());
    }
}
