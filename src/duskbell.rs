//! Application coordinator that manages the complete lifecycle of duskbell.
//!
//! Acquires the single-instance lock, loads the configuration, installs the
//! signal handler, builds the audio output and display, and hands everything
//! to [`Core`]. The builder covers the two startup contexts:
//!
//! - Normal startup: `Duskbell::new(debug_enabled).run()`
//! - Simulation: `Duskbell::new(debug_enabled).without_lock().with_silent_audio().run()`

use anyhow::Result;
use std::sync::Arc;

use crate::{
    audio::{self, AudioOutput, silent::SilentOutput},
    config::Config,
    core::{Core, CoreParams},
    display::TerminalDisplay,
    io::{
        lock::acquire_lock,
        signals::{SignalState, setup_signal_handler},
    },
};

/// Builder for configuring and running the duskbell application.
pub struct Duskbell {
    debug_enabled: bool,
    create_lock: bool,
    silent_audio: bool,
}

impl Duskbell {
    /// Create a new runner with defaults matching normal run
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            create_lock: true,
            silent_audio: false,
        }
    }

    /// Skip lock file creation and signal handling (simulation mode)
    pub fn without_lock(mut self) -> Self {
        self.create_lock = false;
        self
    }

    /// Use the silent output regardless of `audio_output`
    pub fn with_silent_audio(mut self) -> Self {
        self.silent_audio = true;
        self
    }

    /// Run until shutdown.
    pub fn run(self) -> Result<()> {
        let lock = if self.create_lock {
            Some(acquire_lock()?)
        } else {
            None
        };

        let config = Config::load()?;
        config.log_config();

        let signal_state = if self.create_lock {
            setup_signal_handler(self.debug_enabled)?
        } else {
            SignalState::detached()
        };

        let output: Arc<dyn AudioOutput> = if self.silent_audio {
            Arc::new(SilentOutput::new())
        } else {
            audio::from_config(&config, self.debug_enabled)
        };

        let display = Box::new(TerminalDisplay::new(config.label(), self.debug_enabled));

        if lock.is_some() {
            log_block_start!("Lock acquired, starting duskbell...");
        }

        Core::new(CoreParams {
            config,
            signal_state,
            output,
            display,
            debug_enabled: self.debug_enabled,
            lock,
        })?
        .execute()
    }
}
