//! Command-line command handlers for duskbell.
//!
//! The one-shot commands (`reload`, `test`) talk to the running instance over
//! signals; `simulate` prepares a simulated clock and then runs the watcher in
//! this process.

pub mod reload;
pub mod simulate;
