//! Application-wide defaults and limits.
//!
//! Every optional configuration key falls back to one of the `DEFAULT_*` values
//! here; the `MINIMUM_*`/`MAXIMUM_*` pairs bound what validation accepts.

// # Identity

pub const DEFAULT_LABEL: &str = "Sunset";

// # Deadline source

pub const DEFAULT_DEADLINE_SOURCE: &str = "solar";
pub const DEFAULT_ALADHAN_METHOD: u8 = 2;
pub const ALADHAN_ENDPOINT: &str = "https://api.aladhan.com/v1/timings";
pub const FETCH_TIMEOUT_SECS: u64 = 15;

// # Polling cadence (seconds)

pub const DEFAULT_POLL_INTERVAL: u64 = 60;
pub const MINIMUM_POLL_INTERVAL: u64 = 10;
pub const MAXIMUM_POLL_INTERVAL: u64 = 600;
pub const DEFAULT_STARTUP_DELAY: u64 = 3;
pub const DEFAULT_RECHECK_DELAY: u64 = 1;
// Upper bound for startup_delay and recheck_delay
pub const MAXIMUM_CHECK_DELAY: u64 = 60 * 60;
// Longest the runtime loop blocks on the real clock (milliseconds)
pub const MAXIMUM_IDLE_WAIT_MS: u64 = 1000;

// # Classification windows (seconds before the deadline)

pub const DEFAULT_APPROACH_WINDOW: u64 = 15 * 60;
pub const DEFAULT_TRIGGER_WINDOW: u64 = 5 * 60;
pub const MAXIMUM_APPROACH_WINDOW: u64 = 3 * 60 * 60;

// # Effect session

pub const DEFAULT_SESSION_DURATION: u64 = 90;
pub const MAXIMUM_SESSION_DURATION: u64 = 60 * 60;
pub const DEFAULT_FADE_OUT: f64 = 0.5;
pub const MAXIMUM_FADE_OUT: f64 = 10.0;
pub const DEFAULT_GRACE_PERIOD: u64 = 10;
pub const MAXIMUM_GRACE_PERIOD: u64 = 60 * 60;

// Effect graph parameters
pub const DISTORTION_AMOUNT: f32 = 20.0;
pub const BANDPASS_FREQUENCY: f32 = 1800.0;
pub const BANDPASS_Q: f32 = 0.7;
pub const HIGHPASS_FREQUENCY: f32 = 700.0;
pub const HIGHPASS_Q: f32 = 0.5;
pub const REVERB_SECONDS: f32 = 1.5;
pub const STATIC_GAIN: f32 = 0.015;
pub const STATIC_OSCILLATOR_HZ: f32 = 0.2;
pub const PANNING_LFO_HZ: f32 = 0.1;
pub const PANNING_DEPTH: f32 = 0.3;
pub const MASTER_GAIN: f32 = 0.8;
pub const MASTER_FADE_IN_SECS: f32 = 1.5;

// Transmission glitch modulation
pub const GLITCH_INTERVAL_SECS: i64 = 3;
pub const GLITCH_PROBABILITY: f64 = 0.3;
pub const GLITCH_DIP_GAIN: f32 = 0.5;

// # Audio output

pub const DEFAULT_AUDIO_OUTPUT: &str = "command";
pub const DEFAULT_PLAYER: &[&str] = &["mpv", "--no-video", "--really-quiet"];

// # View transitions (seconds)

pub const DEFAULT_CINEMATIC: bool = true;
pub const DEFAULT_CINEMATIC_INTERVAL: u64 = 45;
pub const MINIMUM_CINEMATIC_INTERVAL: u64 = 5;
pub const MAXIMUM_CINEMATIC_INTERVAL: u64 = 24 * 60 * 60;
pub const DEFAULT_FOCUS_DURATION: f64 = 6.5;

// # Exit codes

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
