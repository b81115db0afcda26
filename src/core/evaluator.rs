//! Classification of "now" against today's deadline.
//!
//! [`evaluate`] is a pure function: the same inputs always produce the same
//! result, so the poll loop may call it as often as it likes.

use chrono::{DateTime, Duration, TimeZone};
use std::fmt;

use crate::core::deadline::Deadline;

/// How close the current instant is to the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Nothing to do: no deadline yet, or more than the approach window away.
    Dormant,
    /// Inside the approach window; the banner and countdown are shown.
    Approaching,
    /// Inside the trigger window; the effect session should be running.
    Triggerable,
    /// An effect session is live. Never produced by [`evaluate`]; the
    /// scheduler reports it in place of the evaluator's result while a
    /// session runs.
    Active,
    /// Today's deadline has already passed.
    Past,
}

impl Classification {
    pub fn shows_banner(&self) -> bool {
        matches!(
            self,
            Classification::Approaching | Classification::Triggerable | Classification::Active
        )
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Classification::Dormant => "dormant",
            Classification::Approaching => "approaching",
            Classification::Triggerable => "triggerable",
            Classification::Active => "active",
            Classification::Past => "past",
        };
        f.write_str(name)
    }
}

/// Window sizes in seconds before the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Windows {
    pub approach: u64,
    pub trigger: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationResult {
    /// Whole seconds until the deadline, rounded up while it lies ahead and
    /// down once it has passed. `None` when no deadline is known.
    pub seconds_until_deadline: Option<i64>,
    pub classification: Classification,
}

impl EvaluationResult {
    pub fn dormant() -> Self {
        Self {
            seconds_until_deadline: None,
            classification: Classification::Dormant,
        }
    }

    /// The same timing with a different classification.
    pub fn reclassified(self, classification: Classification) -> Self {
        Self {
            classification,
            ..self
        }
    }
}

/// Today's deadline as an instant in `now`'s timezone.
///
/// A deadline that falls into a DST gap is moved forward by an hour, and an
/// ambiguous one resolves to its first occurrence.
pub fn deadline_instant<Tz: TimeZone>(now: &DateTime<Tz>, deadline: Deadline) -> Option<DateTime<Tz>> {
    let naive = now.date_naive().and_time(deadline.as_time());
    let tz = now.timezone();
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
}

/// Classify `now` against `deadline`.
pub fn evaluate<Tz: TimeZone>(
    now: &DateTime<Tz>,
    deadline: Option<Deadline>,
    windows: &Windows,
) -> EvaluationResult {
    let Some(deadline) = deadline else {
        return EvaluationResult::dormant();
    };
    let Some(instant) = deadline_instant(now, deadline) else {
        return EvaluationResult::dormant();
    };

    let remaining_ms = instant.signed_duration_since(now).num_milliseconds();

    if remaining_ms <= 0 {
        return EvaluationResult {
            seconds_until_deadline: Some(remaining_ms.div_euclid(1000)),
            classification: Classification::Past,
        };
    }

    let seconds = (remaining_ms + 999) / 1000;
    let classification = if seconds as u64 <= windows.trigger {
        Classification::Triggerable
    } else if seconds as u64 <= windows.approach {
        Classification::Approaching
    } else {
        Classification::Dormant
    };

    EvaluationResult {
        seconds_until_deadline: Some(seconds),
        classification,
    }
}
