//! Check cadence: a fixed-interval poll plus one-shot early checks.

use chrono::{DateTime, Duration, Local};

/// Owns nothing but the due times of the next checks.
#[derive(Debug)]
pub struct PollScheduler {
    interval: Duration,
    next_poll: Option<DateTime<Local>>,
    pending_check: Option<DateTime<Local>>,
}

impl PollScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_poll: None,
            pending_check: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Arm the recurring poll and the first check after `startup_delay`.
    pub fn start(&mut self, now: DateTime<Local>, startup_delay: Duration) {
        self.next_poll = Some(now + self.interval);
        self.pending_check = Some(now + startup_delay);
    }

    /// Change the cadence; the next regular poll is re-armed from `now`.
    pub fn set_interval(&mut self, interval: Duration, now: DateTime<Local>) {
        self.interval = interval;
        if self.next_poll.is_some() {
            self.next_poll = Some(now + interval);
        }
    }

    /// Schedule a one-shot check. An earlier pending check is kept.
    pub fn request_check(&mut self, now: DateTime<Local>, delay: Duration) {
        let at = now + delay;
        self.pending_check = Some(match self.pending_check {
            Some(existing) if existing <= at => existing,
            _ => at,
        });
    }

    /// Consume whatever is due at `now`. Returns true if a check should run.
    ///
    /// Several due triggers collapse into one check, and missed regular ticks
    /// are skipped rather than replayed.
    pub fn take_due(&mut self, now: DateTime<Local>) -> bool {
        let mut due = false;

        if let Some(at) = self.pending_check
            && at <= now
        {
            self.pending_check = None;
            due = true;
        }

        if let Some(mut at) = self.next_poll
            && at <= now
        {
            while at <= now {
                at += self.interval;
            }
            self.next_poll = Some(at);
            due = true;
        }

        due
    }

    pub fn next_due(&self) -> Option<DateTime<Local>> {
        match (self.next_poll, self.pending_check) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn stop(&mut self) {
        self.next_poll = None;
        self.pending_check = None;
    }
}
