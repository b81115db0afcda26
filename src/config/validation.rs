//! Configuration validation.
//!
//! Runs after parsing and before any value is used, so the rest of the crate can
//! rely on the accessors returning sane values.

use anyhow::{Result, bail};

use super::Config;
use crate::common::constants::*;
use crate::core::deadline::Deadline;

pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(label) = &config.label
        && label.trim().is_empty()
    {
        bail!("label must not be empty");
    }

    if let Some(lat) = config.latitude
        && !(-90.0..=90.0).contains(&lat)
    {
        bail!("latitude must be between -90 and 90 degrees (got {lat})");
    }
    if let Some(lon) = config.longitude
        && !(-180.0..=180.0).contains(&lon)
    {
        bail!("longitude must be between -180 and 180 degrees (got {lon})");
    }

    match config.deadline_source() {
        "solar" | "aladhan" => {
            if config.latitude.is_none() || config.longitude.is_none() {
                bail!(
                    "deadline_source = \"{}\" requires latitude and longitude",
                    config.deadline_source()
                );
            }
        }
        "fixed" => match config.deadline.as_deref() {
            Some(text) => {
                Deadline::parse(text)?;
            }
            None => bail!("deadline_source = \"fixed\" requires a deadline (\"HH:MM\")"),
        },
        other => bail!("deadline_source must be \"solar\", \"aladhan\" or \"fixed\" (got \"{other}\")"),
    }

    let poll = config.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);
    if !(MINIMUM_POLL_INTERVAL..=MAXIMUM_POLL_INTERVAL).contains(&poll) {
        bail!(
            "poll_interval ({poll}s) must be between {MINIMUM_POLL_INTERVAL} and {MAXIMUM_POLL_INTERVAL} seconds"
        );
    }

    for (key, delay) in [
        ("startup_delay", config.startup_delay),
        ("recheck_delay", config.recheck_delay),
    ] {
        if let Some(delay) = delay
            && delay > MAXIMUM_CHECK_DELAY
        {
            bail!("{key} ({delay}s) must not exceed {MAXIMUM_CHECK_DELAY} seconds");
        }
    }

    let approach = config.approach_window();
    let trigger = config.trigger_window();
    if trigger == 0 {
        bail!("trigger_window must be greater than 0");
    }
    if approach > MAXIMUM_APPROACH_WINDOW {
        bail!("approach_window ({approach}s) must not exceed {MAXIMUM_APPROACH_WINDOW} seconds");
    }
    if trigger > approach {
        bail!("trigger_window ({trigger}s) must not exceed approach_window ({approach}s)");
    }

    let session = config.session_duration();
    if session == 0 || session > MAXIMUM_SESSION_DURATION {
        bail!("session_duration ({session}s) must be between 1 and {MAXIMUM_SESSION_DURATION} seconds");
    }

    if let Some(fade) = config.fade_out
        && !(0.0..=MAXIMUM_FADE_OUT).contains(&fade)
    {
        bail!("fade_out ({fade}s) must be between 0 and {MAXIMUM_FADE_OUT} seconds");
    }

    if let Some(grace) = config.grace_period
        && grace > MAXIMUM_GRACE_PERIOD
    {
        bail!("grace_period ({grace}s) must not exceed {MAXIMUM_GRACE_PERIOD} seconds");
    }

    match config.audio_output() {
        "command" => {
            if config.player().iter().all(|arg| arg.trim().is_empty()) {
                bail!("player must name a command when audio_output = \"command\"");
            }
        }
        "silent" => {}
        other => bail!("audio_output must be \"command\" or \"silent\" (got \"{other}\")"),
    }

    if let Some(interval) = config.cinematic_interval
        && !(MINIMUM_CINEMATIC_INTERVAL..=MAXIMUM_CINEMATIC_INTERVAL).contains(&interval)
    {
        bail!(
            "cinematic_interval ({interval}s) must be between {MINIMUM_CINEMATIC_INTERVAL} and {MAXIMUM_CINEMATIC_INTERVAL} seconds"
        );
    }

    if let Some(focus) = config.focus_duration
        && !(0.0..=60.0).contains(&focus)
    {
        bail!("focus_duration ({focus}s) must be between 0 and 60 seconds");
    }

    Ok(())
}
