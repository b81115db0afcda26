//! Wall-clock access for the runtime loop.
//!
//! The scheduler state machine never reads the clock itself; the loop in
//! `core::Core` asks [`source::now`] and hands the instant down. Swapping the
//! global source for a [`source::SimulatedTimeSource`] is what powers
//! `duskbell simulate`.

pub mod source;
