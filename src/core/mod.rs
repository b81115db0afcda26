//! Core application logic and the runtime loop.
//!
//! The state machine lives in [`scheduler`]; this module wires it to the
//! outside world. [`Core`] owns the scheduler, the configuration and the event
//! channel, and runs the loop that:
//!
//! - fires due timers on the current clock (real or simulated)
//! - delivers events from signals, deadline lookups and playback waiters
//! - reloads the configuration on request
//! - tears the session down on shutdown

pub mod countdown;
pub mod deadline;
pub mod evaluator;
pub mod events;
pub mod guard;
pub mod poll;
pub mod presenter;
pub mod scheduler;
pub mod sequencer;
pub mod view;

use anyhow::Result;
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use crate::{
    audio::AudioOutput,
    common::{constants::*, utils},
    config::{self, Config},
    core::{
        events::Event,
        scheduler::{Scheduler, SchedulerSettings},
    },
    display::Display,
    io::{lock::LockFile, signals::SignalState},
    source::{self, Location},
};

/// Parameters for creating a Core instance.
pub struct CoreParams {
    pub config: Config,
    pub signal_state: SignalState,
    pub output: Arc<dyn AudioOutput>,
    pub display: Box<dyn Display>,
    pub debug_enabled: bool,
    /// Held for the lifetime of the loop; `None` in simulations.
    pub lock: Option<LockFile>,
}

pub struct Core {
    config: Config,
    scheduler: Scheduler,
    signal_state: SignalState,
    debug_enabled: bool,
    lock: Option<LockFile>,
}

impl Core {
    pub fn new(params: CoreParams) -> Result<Self> {
        let source = source::from_config(&params.config)?;
        let scheduler = Scheduler::new(
            SchedulerSettings::from_config(&params.config),
            source,
            params.output,
            params.display,
            Location::from_config(&params.config),
            params.signal_state.sender.clone(),
        );

        Ok(Self {
            config: params.config,
            scheduler,
            signal_state: params.signal_state,
            debug_enabled: params.debug_enabled,
            lock: params.lock,
        })
    }

    /// Run until shutdown (or until a simulation reaches its end time).
    pub fn execute(mut self) -> Result<()> {
        if let Some(custom_dir) = config::get_custom_config_dir() {
            log_block_start!("Base directory: {}", utils::private_path(&custom_dir));
        }

        let output = Arc::clone(self.scheduler.sequencer().output());
        log_block_start!("Using {} audio output", output.name());
        if !output.is_ready() {
            log_warning!("Audio output is not ready; sessions will be skipped until it is");
        }

        self.scheduler.start(crate::time::source::now());
        self.main_loop();

        log_block_start!("Shutting down duskbell...");
        self.scheduler.shutdown(crate::time::source::now());
        if self.debug_enabled && output.live_nodes() > 0 {
            log_warning!("{} audio nodes still live at exit", output.live_nodes());
        }

        drop(self.lock.take());
        log_end!();
        Ok(())
    }

    fn main_loop(&mut self) {
        while self.signal_state.running.load(Ordering::SeqCst)
            && !crate::time::source::simulation_ended()
        {
            let now = crate::time::source::now();
            self.scheduler.on_timers(now);

            // Anything queued while the timers ran
            while let Ok(event) = self.signal_state.receiver.try_recv() {
                if !self.dispatch(event) {
                    return;
                }
            }

            let sleep_duration = self.determine_sleep_duration(now);

            let received = if crate::time::source::is_simulated() {
                // Sleep in a separate thread so events still arrive
                let sleep_handle = std::thread::spawn(move || {
                    crate::time::source::sleep(sleep_duration);
                });

                loop {
                    match self
                        .signal_state
                        .receiver
                        .recv_timeout(Duration::from_millis(10))
                    {
                        Ok(event) => break Some(event),
                        Err(RecvTimeoutError::Timeout) => {
                            if sleep_handle.is_finished() {
                                break None;
                            }
                        }
                        Err(RecvTimeoutError::Disconnected) => break None,
                    }
                }
            } else {
                self.signal_state.receiver.recv_timeout(sleep_duration).ok()
            };

            if let Some(event) = received
                && !self.dispatch(event)
            {
                return;
            }
        }
    }

    /// Route one event. Returns false when the loop should stop.
    fn dispatch(&mut self, event: Event) -> bool {
        match event {
            Event::Shutdown => {
                self.signal_state.running.store(false, Ordering::SeqCst);
                false
            }
            Event::Reload => {
                self.handle_config_reload(crate::time::source::now());
                true
            }
            event => {
                self.scheduler
                    .handle_event(event, crate::time::source::now());
                true
            }
        }
    }

    /// Time until the scheduler's next timer, capped so a wall-clock jump is
    /// noticed within a second.
    fn determine_sleep_duration(&self, now: DateTime<Local>) -> Duration {
        let until_wake = self
            .scheduler
            .next_wake()
            .map(|wake| wake - now)
            .unwrap_or_else(|| self.config.poll_interval())
            .to_std()
            .unwrap_or_default();

        if crate::time::source::is_simulated() {
            until_wake.max(Duration::from_millis(1))
        } else {
            until_wake.clamp(
                Duration::from_millis(1),
                Duration::from_millis(MAXIMUM_IDLE_WAIT_MS),
            )
        }
    }

    fn handle_config_reload(&mut self, now: DateTime<Local>) {
        let new_config = match Config::load() {
            Ok(config) => config,
            Err(e) => {
                log_pipe!();
                log_error!("Failed to reload config: {e}");
                log_indented!("Continuing with previous configuration");
                return;
            }
        };

        let source = if new_config.deadline_inputs_changed(&self.config) {
            match source::from_config(&new_config) {
                Ok(source) => Some(source),
                Err(e) => {
                    log_pipe!();
                    log_error!("Failed to reload config: {e}");
                    log_indented!("Continuing with previous configuration");
                    return;
                }
            }
        } else {
            None
        };

        if new_config.audio_output() != self.config.audio_output()
            || new_config.player() != self.config.player()
            || new_config.asset() != self.config.asset()
        {
            log_pipe!();
            log_warning!("Audio output changes take effect after a restart");
        }

        new_config.log_config();
        self.scheduler.apply_config(
            SchedulerSettings::from_config(&new_config),
            source,
            Location::from_config(&new_config),
            now,
        );
        self.config = new_config;
    }
}
