//! Configuration for duskbell.
//!
//! Settings live in `duskbell.toml` under `$XDG_CONFIG_HOME/duskbell/` (or the
//! directory given with `--config`). A commented default file is written on
//! first run. Every key is optional; missing keys fall back to the defaults in
//! `common::constants`.
//!
//! ```toml
//! label = "Sunset"              # Name shown in the banner ("<label> time!")
//! deadline_source = "solar"     # "solar", "aladhan" or "fixed"
//! #deadline = "18:30"           # Clock time for the fixed source (HH:MM)
//! latitude = 41.0082
//! longitude = 28.9784
//! aladhan_method = 2            # Calculation method for the aladhan source
//!
//! poll_interval = 60            # Seconds between deadline checks (10-600)
//! approach_window = 900         # Show the banner this many seconds before
//! trigger_window = 300          # Start the effect this many seconds before
//! session_duration = 90         # Length of the effect session in seconds
//!
//! audio_output = "command"      # "command" (external player) or "silent"
//! player = ["mpv", "--no-video", "--really-quiet"]
//! asset = "~/Music/adhan.ogg"
//!
//! cinematic = true              # Alternate the view on a timer
//! cinematic_interval = 45
//! ```
//!
//! Validation rejects impossible combinations (a trigger window wider than the
//! approach window, a solar source without coordinates) with a message naming
//! the offending key.

pub mod loading;
pub mod validation;

use chrono::Duration;
use serde::Deserialize;
use std::path::PathBuf;

use crate::common::constants::*;
use crate::common::utils::private_path;

pub use loading::{
    create_default_config, get_config_path, get_custom_config_dir, load, load_from_path,
    set_config_dir,
};
pub use validation::validate_config;

/// Parsed `duskbell.toml`.
///
/// Fields stay optional so that "not set" survives parsing; use the accessor
/// methods to read a value with its default applied.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    pub label: Option<String>,

    /// "solar", "aladhan" or "fixed"
    pub deadline_source: Option<String>,
    /// HH:MM, only read by the fixed source
    pub deadline: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub aladhan_method: Option<u8>,

    // Cadence, in seconds
    pub poll_interval: Option<u64>,
    pub startup_delay: Option<u64>,
    pub recheck_delay: Option<u64>,

    pub approach_window: Option<u64>,
    pub trigger_window: Option<u64>,

    pub session_duration: Option<u64>,
    pub fade_out: Option<f64>,
    pub grace_period: Option<u64>,

    /// "command" or "silent"
    pub audio_output: Option<String>,
    pub player: Option<Vec<String>>,
    pub asset: Option<PathBuf>,

    pub cinematic: Option<bool>,
    pub cinematic_interval: Option<u64>,
    pub focus_duration: Option<f64>,
}

fn seconds_f64(secs: f64) -> Duration {
    Duration::milliseconds((secs * 1000.0).round() as i64)
}

impl Config {
    /// Load configuration using the module's load function
    pub fn load() -> anyhow::Result<Self> {
        load()
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(DEFAULT_LABEL)
    }

    pub fn deadline_source(&self) -> &str {
        self.deadline_source
            .as_deref()
            .unwrap_or(DEFAULT_DEADLINE_SOURCE)
    }

    pub fn aladhan_method(&self) -> u8 {
        self.aladhan_method.unwrap_or(DEFAULT_ALADHAN_METHOD)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::seconds(self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL) as i64)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::seconds(self.startup_delay.unwrap_or(DEFAULT_STARTUP_DELAY) as i64)
    }

    pub fn recheck_delay(&self) -> Duration {
        Duration::seconds(self.recheck_delay.unwrap_or(DEFAULT_RECHECK_DELAY) as i64)
    }

    pub fn approach_window(&self) -> u64 {
        self.approach_window.unwrap_or(DEFAULT_APPROACH_WINDOW)
    }

    pub fn trigger_window(&self) -> u64 {
        self.trigger_window.unwrap_or(DEFAULT_TRIGGER_WINDOW)
    }

    pub fn session_duration(&self) -> u64 {
        self.session_duration.unwrap_or(DEFAULT_SESSION_DURATION)
    }

    pub fn fade_out(&self) -> Duration {
        seconds_f64(self.fade_out.unwrap_or(DEFAULT_FADE_OUT))
    }

    pub fn grace_period(&self) -> Duration {
        Duration::seconds(self.grace_period.unwrap_or(DEFAULT_GRACE_PERIOD) as i64)
    }

    pub fn audio_output(&self) -> &str {
        self.audio_output.as_deref().unwrap_or(DEFAULT_AUDIO_OUTPUT)
    }

    pub fn player(&self) -> Vec<String> {
        self.player
            .clone()
            .unwrap_or_else(|| DEFAULT_PLAYER.iter().map(|s| s.to_string()).collect())
    }

    /// The asset path with a leading `~/` expanded.
    pub fn asset(&self) -> Option<PathBuf> {
        let asset = self.asset.as_ref()?;
        match (asset.strip_prefix("~"), dirs::home_dir()) {
            (Ok(rest), Some(home)) => Some(home.join(rest)),
            _ => Some(asset.clone()),
        }
    }

    pub fn cinematic(&self) -> bool {
        self.cinematic.unwrap_or(DEFAULT_CINEMATIC)
    }

    pub fn cinematic_interval(&self) -> Duration {
        Duration::seconds(
            self.cinematic_interval
                .unwrap_or(DEFAULT_CINEMATIC_INTERVAL) as i64,
        )
    }

    pub fn focus_duration(&self) -> Duration {
        seconds_f64(self.focus_duration.unwrap_or(DEFAULT_FOCUS_DURATION))
    }

    /// True when switching from `previous` to `self` moves the deadline:
    /// a different source, location or fixed time.
    pub fn deadline_inputs_changed(&self, previous: &Config) -> bool {
        self.deadline_source() != previous.deadline_source()
            || self.latitude != previous.latitude
            || self.longitude != previous.longitude
            || self.deadline != previous.deadline
            || self.aladhan_method() != previous.aladhan_method()
    }

    pub fn log_config(&self) {
        log_block_start!("Loaded configuration");
        if let Some(dir) = get_custom_config_dir() {
            log_indented!("Directory: {}", private_path(&dir));
        }
        log_indented!("Label: {}", self.label());

        match self.deadline_source() {
            "fixed" => log_indented!(
                "Deadline: fixed at {}",
                self.deadline.as_deref().unwrap_or("?")
            ),
            source => log_indented!("Deadline: {source}"),
        }
        if let (Some(lat), Some(lon)) = (self.latitude, self.longitude) {
            log_indented!(
                "Location: {:.3}°{}, {:.3}°{}",
                lat.abs(),
                if lat >= 0.0 { "N" } else { "S" },
                lon.abs(),
                if lon >= 0.0 { "E" } else { "W" }
            );
        }

        log_indented!(
            "Windows: approach {}s, trigger {}s",
            self.approach_window(),
            self.trigger_window()
        );
        log_indented!(
            "Session: {}s, fade-out {:.1}s",
            self.session_duration(),
            self.fade_out().num_milliseconds() as f64 / 1000.0
        );
        log_indented!("Poll interval: {}s", self.poll_interval().num_seconds());

        match self.audio_output() {
            "command" => log_indented!("Audio: {}", self.player().join(" ")),
            other => log_indented!("Audio: {other}"),
        }
        if self.cinematic() {
            log_indented!(
                "Cinematic view: every {}s",
                self.cinematic_interval().num_seconds()
            );
        }
    }
}
