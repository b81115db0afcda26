//! Implementation of the simulate command.
//!
//! Installs a [`SimulatedTimeSource`] before anything else reads the clock and
//! hands back guards that keep the optional file logger and progress monitor
//! alive. The watcher then runs unchanged against the simulated clock, with the
//! silent audio output so sessions end on simulated time.

use anyhow::{Result, bail};
use chrono::{DateTime, Local};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::common::logger::{Log, LoggerGuard};
use crate::io::instance::get_running_instance_pid;
use crate::time::source::{Pace, SimulatedTimeSource, TimeSource, parse_datetime};

const PROGRESS_WIDTH: usize = 40;

/// Guards that need to stay alive for the duration of the simulation.
pub struct SimulationGuards {
    logger_guard: Option<LoggerGuard>,
    progress_handle: Option<thread::JoinHandle<()>>,
    progress_shutdown: Arc<AtomicBool>,
    log_to_file: bool,
    is_complete: bool,
}

impl SimulationGuards {
    fn stop_progress(&mut self) {
        self.progress_shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.progress_handle.take() {
            let _ = handle.join();
            print!("\r\x1B[K");
            let _ = std::io::stdout().flush();
        }
    }

    /// Finish after the watcher returned normally.
    pub fn complete_simulation(&mut self) {
        self.is_complete = true;
        self.stop_progress();

        if self.log_to_file {
            drop(self.logger_guard.take());
            println!("┣ Simulation complete");
            println!("╹");
        }
    }
}

impl Drop for SimulationGuards {
    fn drop(&mut self) {
        if self.is_complete {
            return;
        }
        self.stop_progress();
        if self.log_to_file {
            drop(self.logger_guard.take());
            println!("┣ Simulation interrupted");
            println!("╹");
        }
    }
}

/// Prepare the simulated clock (and file logging when `log_to_file`).
///
/// `multiplier` follows [`Pace::from_multiplier`]: zero fast-forwards, a
/// negative value selects the default pace.
pub fn handle_simulate_command(
    start_time: &str,
    end_time: &str,
    multiplier: f64,
    debug_enabled: bool,
    log_to_file: bool,
) -> Result<SimulationGuards> {
    if let Ok(pid) = get_running_instance_pid() {
        bail!("duskbell is already running (PID: {pid}); stop it before simulating");
    }

    let start = parse_datetime(start_time)?;
    let end = parse_datetime(end_time)?;
    if end <= start {
        bail!("End time must be after start time");
    }

    let pace = Pace::from_multiplier(multiplier);
    let sim_source = Arc::new(SimulatedTimeSource::new(start, end, pace));
    let progress_shutdown = Arc::new(AtomicBool::new(false));

    let mut logger_guard = None;
    let mut progress_handle = None;

    if log_to_file {
        // Terminal header without simulated timestamps
        log_version!();
        log_block_start!("Simulation Mode");
        log_simulation_details(start, end, pace);

        let log_filename = format!(
            "duskbell-simulation-{}.log",
            Local::now().format("%Y%m%d-%H%M%S")
        );
        log_block_start!("Logging simulation output to: {log_filename}");

        crate::time::source::init_time_source(sim_source.clone());
        logger_guard = Some(Log::start_file_logging(log_filename)?);
        progress_handle = Some(spawn_progress_monitor(
            sim_source.clone(),
            progress_shutdown.clone(),
        ));
    } else {
        crate::time::source::init_time_source(sim_source.clone());
    }

    log_version!();
    log_block_start!("Simulation Mode");
    log_simulation_details(start, end, pace);
    log_indented!("Running simulation...");

    if debug_enabled {
        log_pipe!();
        log_debug!("Simulated time source initialized");
    }

    Ok(SimulationGuards {
        logger_guard,
        progress_handle,
        progress_shutdown,
        log_to_file,
        is_complete: false,
    })
}

/// Render a progress line such as `┣ [████░░░░] 50% fast-forward`.
pub fn render_progress(progress: f64, suffix: &str) -> String {
    let progress = progress.clamp(0.0, 1.0);
    let filled = (progress * PROGRESS_WIDTH as f64).round() as usize;
    format!(
        "┣ [{}{}] {:>3}% {suffix}",
        "█".repeat(filled),
        "░".repeat(PROGRESS_WIDTH - filled),
        (progress * 100.0).round() as u32
    )
}

// Writes straight to stdout so the bar stays on the terminal while the log
// goes to the file.
fn spawn_progress_monitor(
    source: Arc<SimulatedTimeSource>,
    shutdown: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let total_ms = (source.end() - source.start()).num_milliseconds().max(1) as f64;
        let started = std::time::Instant::now();

        while !shutdown.load(Ordering::SeqCst) {
            let elapsed_ms = (source.now() - source.start()).num_milliseconds() as f64;
            let progress = (elapsed_ms / total_ms).clamp(0.0, 1.0);

            let suffix = match source.pace() {
                Pace::FastForward => "fast-forward".to_string(),
                Pace::Accelerated(_) if progress > 0.0 && progress < 1.0 => {
                    let real = started.elapsed().as_secs_f64();
                    format!("ETA: {:.1}s", (real / progress - real).max(0.0))
                }
                Pace::Accelerated(_) => "completing...".to_string(),
            };

            print!("\r\x1B[K{}", render_progress(progress, &suffix));
            let _ = std::io::stdout().flush();

            if source.is_ended() {
                break;
            }
            thread::sleep(Duration::from_millis(100));
        }
    })
}

fn log_simulation_details(start: DateTime<Local>, end: DateTime<Local>, pace: Pace) {
    let duration = end - start;

    log_decorated!(
        "Simulating from {} to {}",
        start.format("%Y-%m-%d %H:%M:%S"),
        end.format("%Y-%m-%d %H:%M:%S")
    );
    log_indented!(
        "Total simulated time: {} hours {} minutes",
        duration.num_hours(),
        duration.num_minutes() % 60
    );
    match pace {
        Pace::FastForward => log_indented!("Time acceleration: fast-forward"),
        Pace::Accelerated(multiplier) => log_indented!(
            "Time acceleration: {}x (theoretical: ~{:.1} seconds)",
            multiplier as u64,
            duration.num_milliseconds() as f64 / 1000.0 / multiplier
        ),
    }
}
