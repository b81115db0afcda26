//! Where the day's deadline comes from.
//!
//! Sources are blocking; the scheduler runs them on a worker thread and gets
//! the answer back as an event.

pub mod aladhan;
pub mod fixed;
pub mod solar;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use std::sync::Arc;

use crate::config::Config;
use crate::core::deadline::Deadline;

pub use aladhan::AladhanSource;
pub use fixed::FixedSource;
pub use solar::SolarSource;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn from_config(config: &Config) -> Option<Self> {
        match (config.latitude, config.longitude) {
            (Some(latitude), Some(longitude)) => Some(Self {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }
}

pub trait DeadlineSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Look up the deadline for `date` at `location`.
    fn fetch(&self, location: Option<Location>, date: NaiveDate) -> Result<Deadline>;
}

pub(crate) fn require_location(location: Option<Location>, source: &str) -> Result<Location> {
    match location {
        Some(location) => Ok(location),
        None => bail!("The {source} source needs latitude and longitude"),
    }
}

/// Build the source named by the configuration.
pub fn from_config(config: &Config) -> Result<Arc<dyn DeadlineSource>> {
    let source: Arc<dyn DeadlineSource> = match config.deadline_source() {
        "solar" => Arc::new(SolarSource),
        "aladhan" => Arc::new(AladhanSource::new(config.aladhan_method())?),
        "fixed" => {
            let Some(text) = config.deadline.as_deref() else {
                bail!("deadline_source = \"fixed\" requires a deadline (\"HH:MM\")");
            };
            Arc::new(FixedSource::new(Deadline::parse(text)?))
        }
        other => bail!("Unknown deadline_source '{other}'"),
    };
    Ok(source)
}
