//! Messages delivered to the scheduler's single execution context.
//!
//! Worker threads (deadline fetches, player waiters) and the signal handler
//! never touch scheduler state; they send one of these instead.

use crate::core::deadline::{Deadline, Lookup};
use crate::core::sequencer::SessionId;
use crate::source::Location;

#[derive(Debug)]
pub enum Event {
    /// A deadline lookup finished.
    DeadlineFetched {
        lookup: Lookup,
        result: anyhow::Result<Deadline>,
    },
    /// Playback of `session` ended, naturally or with an error.
    PlaybackFinished {
        session: SessionId,
        result: Result<(), String>,
    },
    /// Diagnostic request to start a session now.
    ManualTrigger,
    /// Diagnostic request to end the running session early.
    ForceStop,
    /// A view transition outside the scheduler started or ended.
    TransitionStarted,
    TransitionEnded,
    LocationChanged(Location),
    /// Re-read the configuration file.
    Reload,
    Shutdown,
}
