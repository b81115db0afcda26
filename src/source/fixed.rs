use anyhow::Result;
use chrono::NaiveDate;

use crate::core::deadline::Deadline;
use crate::source::{DeadlineSource, Location};

/// The same configured clock time every day.
#[derive(Debug, Clone, Copy)]
pub struct FixedSource {
    deadline: Deadline,
}

impl FixedSource {
    pub fn new(deadline: Deadline) -> Self {
        Self { deadline }
    }
}

impl DeadlineSource for FixedSource {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn fetch(&self, _location: Option<Location>, _date: NaiveDate) -> Result<Deadline> {
        Ok(self.deadline)
    }
}
