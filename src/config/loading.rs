//! Locating, creating and reading the configuration file.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::Config;
use super::validation::validate_config;
use crate::common::utils::private_path;

pub const CONFIG_FILE_NAME: &str = "duskbell.toml";

/// Global configuration directory, set once at startup
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Set the configuration directory for the current process.
/// This can only be called once, typically at startup.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

/// Get the custom configuration directory if one was set.
pub fn get_custom_config_dir() -> Option<PathBuf> {
    CONFIG_DIR.get().and_then(|d| d.clone())
}

pub fn get_config_path() -> Result<PathBuf> {
    if let Some(custom_dir) = get_custom_config_dir() {
        return Ok(custom_dir.join(CONFIG_FILE_NAME));
    }
    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join("duskbell").join(CONFIG_FILE_NAME))
}

/// Load the configuration, writing the default file first if none exists.
pub fn load() -> Result<Config> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        create_default_config(&config_path)
            .context("Failed to create default config during load")?;
    }

    load_from_path(&config_path).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            private_path(&config_path)
        )
    })
}

/// Load configuration from a specific path.
///
/// Unlike [`load`] this never creates the file.
pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        bail!("Configuration file not found at {}", private_path(path));
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", private_path(path)))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", private_path(path)))?;

    validate_config(&config)?;

    Ok(config)
}

const DEFAULT_CONFIG: &str = r#"#[Deadline]
label = "Sunset"              # Banner text on completion reads "<label> time!"
deadline_source = "fixed"     # "solar" (computed sunset), "aladhan" (Maghrib via API) or "fixed"
deadline = "18:00"            # Clock time used by the fixed source (HH:MM)
#latitude = 41.0082           # Required by the solar and aladhan sources
#longitude = 28.9784
#aladhan_method = 2           # Aladhan calculation method

#[Timing]
poll_interval = 60            # Seconds between deadline checks (10-600)
approach_window = 900         # Show the banner this many seconds before the deadline
trigger_window = 300          # Start the effect this many seconds before the deadline
session_duration = 90         # Effect length in seconds
fade_out = 0.5                # Fade at the end of the effect in seconds
grace_period = 10             # Keep the banner up this long after the effect

#[Audio]
audio_output = "command"      # "command" (external player) or "silent"
player = ["mpv", "--no-video", "--really-quiet"]
#asset = "~/Music/duskbell.ogg"

#[View]
cinematic = true              # Alternate between globe and orbit views
cinematic_interval = 45       # Seconds between automatic view switches
focus_duration = 6.5          # Seconds a location focus transition takes
"#;

/// Write the commented default configuration to `path`.
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", private_path(parent)))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write default config to {}", private_path(path)))?;

    log_block_start!("Created default configuration: {}", private_path(path));
    Ok(())
}

#[cfg(test)]
pub(crate) fn default_config_text() -> &'static str {
    DEFAULT_CONFIG
}
