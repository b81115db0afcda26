//! In-flight tracking for long-running view transitions.
//!
//! A transition holds a [`TransitionTicket`] for as long as its animation
//! runs. Dropping the ticket (normal end, early return, or replacement by a
//! newer transition) is the only way to clear it, so the flag cannot be left
//! set by a forgotten exit path.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Process-wide "a transition is mid-flight" flag, cheap to clone and share.
#[derive(Debug, Clone, Default)]
pub struct TransitionGuard {
    in_flight: Arc<AtomicUsize>,
}

impl TransitionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_transitioning(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Mark a transition as started. The flag stays set until the returned
    /// ticket is dropped.
    #[must_use = "the transition ends when the ticket is dropped"]
    pub fn begin(&self) -> TransitionTicket {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        TransitionTicket {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Run `f` with the flag set, clearing it on every exit path.
    pub fn with_transition<R>(&self, f: impl FnOnce() -> R) -> R {
        let _ticket = self.begin();
        f()
    }
}

/// Proof that a transition is running.
#[derive(Debug)]
pub struct TransitionTicket {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for TransitionTicket {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_scopes_flag() {
        let guard = TransitionGuard::new();
        assert!(!guard.is_transitioning());
        let ticket = guard.begin();
        assert!(guard.is_transitioning());
        drop(ticket);
        assert!(!guard.is_transitioning());
    }

    #[test]
    fn test_with_transition_clears_after_panic() {
        let guard = TransitionGuard::new();
        let inner = guard.clone();
        let outcome = std::panic::catch_unwind(move || {
            inner.with_transition(|| {
                assert!(inner.is_transitioning());
                panic!("animation aborted");
            })
        });
        assert!(outcome.is_err());
        assert!(!guard.is_transitioning());
    }

    #[test]
    fn test_preempting_transition_keeps_flag_until_replacement_ends() {
        let guard = TransitionGuard::new();
        let mut slot = guard.begin();
        assert!(guard.is_transitioning());

        // A follow-up request replaces the running transition
        slot = guard.begin();
        assert!(guard.is_transitioning());

        drop(slot);
        assert!(!guard.is_transitioning());
    }
}
