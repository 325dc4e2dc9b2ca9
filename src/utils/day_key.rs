use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::America::New_York;

use crate::error::{Error, Result};

/// Canonical identifier for one scheduling calendar day.
///
/// The key is the UTC instant `(y, m, d) 00:00:00Z` built from the
/// date as observed in America/New_York. This is NOT Eastern midnight
/// converted to UTC; the Y/M/D components are re-labelled as a UTC
/// midnight so that stored keys compare by calendar day alone. Existing
/// data is encoded this way, so the scheme must not change without a
/// migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(DateTime<Utc>);

impl DayKey {
    /// Parses arbitrary client date input into a day key.
    ///
    /// Calendar-date-only inputs (`YYYY-MM-DD`, `MM/DD/YYYY`) take their
    /// components verbatim; full instants are re-bucketed into the
    /// Eastern calendar day first.
    pub fn normalize(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Self::from_ymd(date.year(), date.month(), date.day());
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%m/%d/%Y") {
            return Self::from_ymd(date.year(), date.month(), date.day());
        }
        if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Self::from_instant(instant.with_timezone(&Utc)));
        }
        Err(Error::BadRequest(format!("Unrecognized date: {}", raw)))
    }

    /// Re-buckets an instant into its Eastern-observed calendar day.
    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        let observed = instant.with_timezone(&New_York).date_naive();
        match observed.and_hms_opt(0, 0, 0) {
            Some(midnight) => Self(Utc.from_utc_datetime(&midnight)),
            // Midnight always exists on a naive date.
            None => Self(instant),
        }
    }

    /// Reads back a stored day key. Stored keys are already UTC-midnight
    /// day labels, so the UTC components are taken verbatim; re-bucketing
    /// through Eastern here would shift every key back one day.
    pub fn from_stored(instant: DateTime<Utc>) -> Self {
        match instant.date_naive().and_hms_opt(0, 0, 0) {
            Some(midnight) => Self(Utc.from_utc_datetime(&midnight)),
            None => Self(instant),
        }
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
            .single()
            .map(Self)
            .ok_or_else(|| {
                Error::BadRequest(format!("Invalid date: {:04}-{:02}-{:02}", year, month, day))
            })
    }

    /// The current Eastern calendar day.
    pub fn today() -> Self {
        Self::from_instant(Utc::now())
    }

    /// Inclusive start of the day range.
    pub fn start(&self) -> DateTime<Utc> {
        self.0
    }

    /// Exclusive end of the day range.
    pub fn end(&self) -> DateTime<Utc> {
        self.0 + Duration::days(1)
    }

    /// Whether a stored entry instant falls on this calendar day.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start() && instant < self.end()
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// `MM/DD/YYYY`, the display form used in responses and emails.
    pub fn display(&self) -> String {
        self.0.format("%m/%d/%Y").to_string()
    }

    /// `YYYY-MM-DD`, the query-parameter form.
    pub fn iso_date(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_date_takes_components_verbatim() {
        let key = DayKey::normalize("2025-03-10").unwrap();
        assert_eq!(key.start(), Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap());
        assert_eq!(key.display(), "03/10/2025");
        assert_eq!(key.iso_date(), "2025-03-10");
    }

    #[test]
    fn us_format_matches_iso_format() {
        let a = DayKey::normalize("03/10/2025").unwrap();
        let b = DayKey::normalize("2025-03-10").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn instant_is_rebucketed_through_eastern() {
        // 02:30 UTC on Mar 11 is 22:30 Mar 10 in New York (EDT).
        let key = DayKey::normalize("2025-03-11T02:30:00Z").unwrap();
        assert_eq!(key.start(), Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap());
    }

    #[test]
    fn key_depends_only_on_eastern_calendar_day() {
        // Same Eastern day, opposite ends of it.
        let morning = DayKey::normalize("2025-07-04T10:00:00-04:00").unwrap();
        let night = DayKey::normalize("2025-07-04T23:59:00-04:00").unwrap();
        assert_eq!(morning, night);

        // A UTC instant late enough to land on the next Eastern day.
        let next = DayKey::normalize("2025-07-05T04:30:00Z").unwrap();
        assert_eq!(morning, next);
    }

    #[test]
    fn winter_offset_is_respected() {
        // 04:30 UTC on Jan 15 is 23:30 Jan 14 Eastern (EST, UTC-5).
        let key = DayKey::normalize("2025-01-15T04:30:00Z").unwrap();
        assert_eq!(key.iso_date(), "2025-01-14");
        // 05:00 UTC is exactly Eastern midnight of Jan 15.
        let key = DayKey::normalize("2025-01-15T05:00:00Z").unwrap();
        assert_eq!(key.iso_date(), "2025-01-15");
    }

    #[test]
    fn day_range_is_half_open() {
        let key = DayKey::normalize("2025-03-10").unwrap();
        assert!(key.contains(key.start()));
        assert!(key.contains(key.start() + Duration::hours(23)));
        assert!(!key.contains(key.end()));
        assert!(!key.contains(key.start() - Duration::seconds(1)));
    }

    #[test]
    fn stored_keys_read_back_unshifted() {
        // A key round-tripped through its RFC 3339 form must not be
        // re-bucketed; UTC midnight observed in Eastern is the prior day.
        let key = DayKey::normalize("2025-03-10").unwrap();
        let parsed = DateTime::parse_from_rfc3339(&key.to_rfc3339())
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(DayKey::from_stored(parsed), key);
        assert_ne!(DayKey::from_instant(parsed), key);
    }

    #[test]
    fn garbage_input_is_rejected() {
        assert!(DayKey::normalize("not a date").is_err());
        assert!(DayKey::normalize("").is_err());
        assert!(DayKey::normalize("2025-13-40").is_err());
    }
}
