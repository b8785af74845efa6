//! Clock seam and timezone-aware calendar dates.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use std::sync::Mutex;

use thiserror::Error;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Calendar date of `now` as seen on site.
pub fn local_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid timezone: {0}")]
pub struct InvalidTimezone(pub String);

/// Parse an IANA zone name like "America/Chicago".
pub fn parse_timezone(name: &str) -> Result<Tz, InvalidTimezone> {
    name.parse().map_err(|_| InvalidTimezone(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_local_date_crosses_midnight() {
        // 03:30 UTC on the 20th is still the evening of the 19th in Chicago (CDT).
        let now = Utc.with_ymd_and_hms(2026, 10, 20, 3, 30, 0).unwrap();
        let tz = parse_timezone("America/Chicago").unwrap();
        assert_eq!(local_date(now, tz), NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        assert_eq!(local_date(now, Tz::UTC), NaiveDate::from_ymd_opt(2026, 10, 20).unwrap());
    }

    #[test]
    fn test_fixed_clock_advance() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        clock.advance(Duration::hours(2));
        assert_eq!(clock.now(), start + Duration::hours(2));
    }

    #[test]
    fn test_invalid_timezone() {
        assert!(parse_timezone("Mars/Olympus").is_err());
    }
}
