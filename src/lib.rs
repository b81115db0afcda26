//! # duskbell
//!
//! Watches a daily deadline (local sunset, the Maghrib prayer time, or a fixed
//! clock time), shows a countdown banner as it approaches and plays a
//! processed audio cue once, inside the trigger window, every day.
//!
//! ## Architecture
//!
//! - **Entry Point**: [`Duskbell`] acquires resources and starts the runtime loop
//! - **Core Logic**: `core` holds the evaluator, poll cadence, presenter,
//!   effect sequencer, transition guard and the scheduler tying them together
//! - **Collaborators**: `source` (deadline lookups), `audio` (effect graph and
//!   outputs), `display` (banner, countdown and status surface)
//! - **Configuration**: `config` for TOML settings with reload on SIGUSR2
//! - **Commands**: `commands` for the `reload`, `test` and `simulate` subcommands
//! - **Infrastructure**: lock file, signals, logging and the swappable clock

// Logger macros must be visible to every module below
#[macro_use]
pub mod common;

pub mod args;
pub mod audio;
pub mod commands;
pub mod config;
pub mod core;
pub mod display;
pub mod io;
pub mod source;
pub mod time;

#[cfg(feature = "testing-support")]
pub mod testing;

mod duskbell;

pub use duskbell::Duskbell;
