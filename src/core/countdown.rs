//! One-second countdown driver.

use chrono::{DateTime, Duration, Local};

/// Who started the countdown. The presenter only ever restarts a
/// `PreApproach` countdown; a `Session` countdown belongs to the effect session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownPurpose {
    PreApproach,
    Session,
}

/// Counts whole seconds down from `total` to zero and then stops.
///
/// The remaining value is derived from the start instant rather than from the
/// number of ticks seen, so a late wake-up catches up instead of drifting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownTimer {
    purpose: CountdownPurpose,
    total: u64,
    started: DateTime<Local>,
    remaining: u64,
}

impl CountdownTimer {
    pub fn start(purpose: CountdownPurpose, total: u64, now: DateTime<Local>) -> Self {
        Self {
            purpose,
            total,
            started: now,
            remaining: total,
        }
    }

    pub fn purpose(&self) -> CountdownPurpose {
        self.purpose
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }

    /// Advance to `now`. Returns the new remaining value if it changed.
    pub fn tick(&mut self, now: DateTime<Local>) -> Option<u64> {
        let elapsed = now.signed_duration_since(self.started).num_seconds().max(0) as u64;
        let remaining = self.total.saturating_sub(elapsed);
        if remaining == self.remaining {
            return None;
        }
        self.remaining = remaining;
        Some(remaining)
    }

    /// When the next decrement is due, or `None` once finished.
    pub fn next_tick(&self) -> Option<DateTime<Local>> {
        if self.is_finished() {
            return None;
        }
        let step = (self.total - self.remaining + 1) as i64;
        Some(self.started + Duration::seconds(step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::source::parse_datetime;

    fn at(s: &str) -> DateTime<Local> {
        parse_datetime(&format!("2026-03-01 {s}")).unwrap()
    }

    #[test]
    fn test_ticks_once_per_second() {
        let mut countdown = CountdownTimer::start(CountdownPurpose::Session, 90, at("18:00:00"));
        assert_eq!(countdown.next_tick(), Some(at("18:00:01")));
        assert_eq!(countdown.tick(at("18:00:00")), None);
        assert_eq!(countdown.tick(at("18:00:01")), Some(89));
        assert_eq!(countdown.next_tick(), Some(at("18:00:02")));
    }

    #[test]
    fn test_late_wakeup_catches_up() {
        let mut countdown = CountdownTimer::start(CountdownPurpose::PreApproach, 300, at("17:55:00"));
        assert_eq!(countdown.tick(at("17:55:07")), Some(293));
        assert_eq!(countdown.next_tick(), Some(at("17:55:08")));
    }

    #[test]
    fn test_stops_at_zero() {
        let mut countdown = CountdownTimer::start(CountdownPurpose::Session, 2, at("18:00:00"));
        assert_eq!(countdown.tick(at("18:00:05")), Some(0));
        assert!(countdown.is_finished());
        assert_eq!(countdown.next_tick(), None);
        assert_eq!(countdown.tick(at("18:00:09")), None);
    }
}
