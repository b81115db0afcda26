//! The day's target clock time and where it came from.

use anyhow::{Result, bail};
use chrono::{NaiveDate, NaiveTime, Timelike};
use std::fmt;

/// A daily clock time, minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline {
    hour: u8,
    minute: u8,
}

impl Deadline {
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 || minute > 59 {
            bail!("Deadline {hour:02}:{minute:02} is not a valid clock time");
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Truncate a time of day to a deadline, dropping seconds.
    pub fn from_time(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    pub fn as_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour.into(), self.minute.into(), 0).unwrap_or(NaiveTime::MIN)
    }

    /// Parse `HH:MM`. Trailing annotations such as ` (+03)` are ignored, which is
    /// how prayer-time services decorate their answers.
    pub fn parse(text: &str) -> Result<Self> {
        let clock = text.split_whitespace().next().unwrap_or_default();
        let Some((hour, minute)) = clock.split_once(':') else {
            bail!("Expected HH:MM, got '{text}'");
        };
        let (Ok(hour), Ok(minute)) = (hour.parse::<u8>(), minute.parse::<u8>()) else {
            bail!("Expected HH:MM, got '{text}'");
        };
        Self::new(hour, minute)
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// One deadline lookup. Results are matched against the lookup that is
/// currently in flight, not just its date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    pub date: NaiveDate,
    pub generation: u64,
}

/// Holds the current deadline plus the bookkeeping needed to refetch it.
///
/// The value itself is last-write-wins. `fetched_for` remembers which date the
/// value was looked up for so a date rollover can trigger a refetch, and
/// `in_flight` prevents a second concurrent lookup. `generation` moves on
/// whenever the inputs of a lookup change, so an answer for the old inputs
/// can never be taken for the new one.
#[derive(Debug, Default)]
pub struct DeadlineStore {
    deadline: Option<Deadline>,
    fetched_for: Option<NaiveDate>,
    in_flight: Option<Lookup>,
    generation: u64,
}

impl DeadlineStore {
    pub fn get(&self) -> Option<Deadline> {
        self.deadline
    }

    /// Store a deadline. Returns true when the value actually changed.
    pub fn set(&mut self, deadline: Deadline, date: NaiveDate) -> bool {
        self.fetched_for = Some(date);
        self.deadline.replace(deadline) != Some(deadline)
    }

    /// Forget the fetch date so the next check asks the source again, and
    /// disown any lookup still running. The deadline value itself is kept
    /// until a new one arrives.
    pub fn invalidate(&mut self) {
        self.fetched_for = None;
        self.in_flight = None;
        self.generation += 1;
    }

    pub fn clear(&mut self) {
        self.deadline = None;
        self.invalidate();
    }

    /// A fetch is due when nothing is in flight and the stored value was not
    /// fetched for `today`.
    pub fn needs_fetch(&self, today: NaiveDate) -> bool {
        self.in_flight.is_none() && self.fetched_for != Some(today)
    }

    /// Record a lookup for `date` as running and return its handle.
    pub fn mark_in_flight(&mut self, date: NaiveDate) -> Lookup {
        let lookup = Lookup {
            date,
            generation: self.generation,
        };
        self.in_flight = Some(lookup);
        lookup
    }

    /// Close out an in-flight fetch. Returns false for a result nobody is
    /// waiting for anymore: one started before a location or source change.
    pub fn finish_fetch(&mut self, lookup: Lookup) -> bool {
        if self.in_flight == Some(lookup) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }
}
