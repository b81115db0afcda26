//! Time source abstraction for real and simulated clocks.
//!
//! A single source is installed per process with [`init_time_source`]. Until one
//! is installed every helper falls back to [`RealTimeSource`].

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, TimeZone};
use once_cell::sync::OnceCell;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration as StdDuration, Instant};

static TIME_SOURCE: OnceCell<Arc<dyn TimeSource>> = OnceCell::new();

/// Default acceleration when `simulate` is given no multiplier.
pub const DEFAULT_SIMULATION_MULTIPLIER: f64 = 3600.0;

/// Trait for abstracting time operations.
pub trait TimeSource: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Local>;

    /// Sleep for the specified duration (or simulate it).
    fn sleep(&self, duration: StdDuration);

    /// Check if this is a simulated time source.
    fn is_simulated(&self) -> bool;

    /// Check if simulation has ended (always false for real time).
    fn is_ended(&self) -> bool {
        false
    }
}

/// The system clock.
pub struct RealTimeSource;

impl TimeSource for RealTimeSource {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: StdDuration) {
        std::thread::sleep(duration);
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

/// How a [`SimulatedTimeSource`] advances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pace {
    /// Each `sleep` jumps the clock forward immediately.
    FastForward,
    /// Simulated time flows `factor` times faster than real time.
    Accelerated(f64),
}

impl Pace {
    /// Map the CLI multiplier: `0` means fast-forward, negative means the default.
    pub fn from_multiplier(multiplier: f64) -> Self {
        if multiplier == 0.0 {
            Pace::FastForward
        } else if multiplier < 0.0 || !multiplier.is_finite() {
            Pace::Accelerated(DEFAULT_SIMULATION_MULTIPLIER)
        } else {
            Pace::Accelerated(multiplier)
        }
    }
}

/// A clock that runs from `start` to `end` and then stops.
///
/// In fast-forward mode time only moves when somebody sleeps, so the runtime
/// loop and the clock stay in lockstep. In accelerated mode time is derived from
/// the real instant the source was created, capped at `end`.
pub struct SimulatedTimeSource {
    start: DateTime<Local>,
    end: DateTime<Local>,
    pace: Pace,
    created: Instant,
    // Fast-forward position
    cursor: Mutex<DateTime<Local>>,
}

impl SimulatedTimeSource {
    pub fn new(start: DateTime<Local>, end: DateTime<Local>, pace: Pace) -> Self {
        Self {
            start,
            end,
            pace,
            created: Instant::now(),
            cursor: Mutex::new(start),
        }
    }

    pub fn start(&self) -> DateTime<Local> {
        self.start
    }

    pub fn end(&self) -> DateTime<Local> {
        self.end
    }

    pub fn pace(&self) -> Pace {
        self.pace
    }

    fn cursor(&self) -> MutexGuard<'_, DateTime<Local>> {
        self.cursor.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn current_time(&self) -> DateTime<Local> {
        match self.pace {
            Pace::FastForward => *self.cursor(),
            Pace::Accelerated(factor) => {
                let simulated_ms = self.created.elapsed().as_secs_f64() * factor * 1000.0;
                let elapsed = ChronoDuration::milliseconds(simulated_ms as i64);
                (self.start + elapsed).min(self.end)
            }
        }
    }
}

impl TimeSource for SimulatedTimeSource {
    fn now(&self) -> DateTime<Local> {
        self.current_time()
    }

    fn sleep(&self, duration: StdDuration) {
        match self.pace {
            Pace::FastForward => {
                {
                    let mut cursor = self.cursor();
                    let step = ChronoDuration::milliseconds(duration.as_millis() as i64);
                    *cursor = (*cursor + step).min(self.end);
                }
                // Let worker threads and the log writer keep up
                std::thread::sleep(StdDuration::from_millis(1));
            }
            Pace::Accelerated(factor) => {
                let remaining = (self.end - self.current_time())
                    .to_std()
                    .unwrap_or(StdDuration::ZERO);
                let simulated = duration.min(remaining);
                if !simulated.is_zero() {
                    std::thread::sleep(simulated.div_f64(factor));
                }
            }
        }
    }

    fn is_simulated(&self) -> bool {
        true
    }

    fn is_ended(&self) -> bool {
        self.current_time() >= self.end
    }
}

/// Initialize the global time source (call once at startup).
pub fn init_time_source(source: Arc<dyn TimeSource>) {
    TIME_SOURCE.set(source).ok();
}

/// Check if the time source has been initialized.
pub fn is_initialized() -> bool {
    TIME_SOURCE.get().is_some()
}

fn global() -> &'static Arc<dyn TimeSource> {
    TIME_SOURCE.get_or_init(|| Arc::new(RealTimeSource))
}

/// Get the current time from the global time source.
pub fn now() -> DateTime<Local> {
    global().now()
}

/// Sleep for the specified duration using the global time source.
pub fn sleep(duration: StdDuration) {
    global().sleep(duration)
}

/// Check if we're running in simulation mode.
pub fn is_simulated() -> bool {
    global().is_simulated()
}

/// Check if simulation has reached its end time (always false for real time).
pub fn simulation_ended() -> bool {
    global().is_ended()
}

/// Parse a local datetime in the format "YYYY-MM-DD HH:MM:SS".
pub fn parse_datetime(s: &str) -> anyhow::Result<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S").map_err(|e| {
        anyhow::anyhow!("Invalid datetime '{s}': {e}. Use YYYY-MM-DD HH:MM:SS")
    })?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| anyhow::anyhow!("'{s}' does not exist in the local timezone"))
}
