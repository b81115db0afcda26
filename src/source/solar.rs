//! Local sunset from coordinates.

use anyhow::{Result, anyhow, bail};
use chrono::{Local, NaiveDate};
use sunrise::{Coordinates, SolarDay, SolarEvent};

use crate::core::deadline::Deadline;
use crate::source::{DeadlineSource, Location, require_location};

#[derive(Debug, Clone, Copy, Default)]
pub struct SolarSource;

impl DeadlineSource for SolarSource {
    fn name(&self) -> &'static str {
        "solar"
    }

    fn fetch(&self, location: Option<Location>, date: NaiveDate) -> Result<Deadline> {
        let location = require_location(location, self.name())?;
        let coord = Coordinates::new(location.latitude, location.longitude)
            .ok_or_else(|| anyhow!("Invalid coordinates"))?;
        let sunset_utc = SolarDay::new(coord, date).event_time(SolarEvent::Sunset);

        // Polar day or night has no sunset; the calculation then falls back
        // to the epoch instead of failing
        if (sunset_utc.date_naive() - date).num_days().abs() > 1 {
            bail!(
                "No sunset at {:.4}°, {:.4}° on {date} (polar day or night)",
                location.latitude,
                location.longitude
            );
        }
        Ok(Deadline::from_time(sunset_utc.with_timezone(&Local).time()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone, Timelike, Utc};

    #[test]
    fn test_requires_location() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert!(SolarSource.fetch(None, date).is_err());
    }

    #[test]
    fn test_rejects_invalid_coordinates() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let location = Location {
            latitude: 123.0,
            longitude: 0.0,
        };
        assert!(SolarSource.fetch(Some(location), date).is_err());
    }

    #[test]
    fn test_equator_sunset_near_six_pm_utc() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 20).unwrap();
        let location = Location {
            latitude: 0.0,
            longitude: 0.0,
        };
        let deadline = SolarSource.fetch(Some(location), date).unwrap();

        let expected = Utc
            .with_ymd_and_hms(2026, 3, 20, 18, 0, 0)
            .unwrap()
            .with_timezone(&Local)
            .time();
        let minutes = |t: NaiveTime| i64::from(t.hour() * 60 + t.minute());
        let diff = (minutes(deadline.as_time()) - minutes(expected)).rem_euclid(24 * 60);
        let drift = diff.min(24 * 60 - diff);
        assert!(drift <= 15, "sunset drifted {drift} minutes from 18:00 UTC");
    }

    #[test]
    fn test_polar_day_and_night_have_no_sunset() {
        let svalbard = Location {
            latitude: 78.2,
            longitude: 15.6,
        };
        for date in [
            NaiveDate::from_ymd_opt(2026, 6, 21).unwrap(),
            NaiveDate::from_ymd_opt(2026, 12, 21).unwrap(),
        ] {
            let err = SolarSource.fetch(Some(svalbard), date).unwrap_err();
            assert!(err.to_string().contains("polar"), "{date}: {err}");
        }
    }

    #[test]
    fn test_far_west_sunset_lands_on_next_utc_day() {
        // Sunset in Hawaii is after midnight UTC
        let date = NaiveDate::from_ymd_opt(2026, 6, 21).unwrap();
        let honolulu = Location {
            latitude: 21.3,
            longitude: -157.9,
        };
        assert!(SolarSource.fetch(Some(honolulu), date).is_ok());
    }
}
