//! Timestamp value object for immutable points in time.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{MonthPeriod, ValidationError};

// Largest offset `chrono::Duration::seconds` accepts.
const MAX_OFFSET_SECS: i64 = i64::MAX / 1000;

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parses an RFC 3339 string such as `2024-01-15T10:30:00Z`.
    pub fn parse_rfc3339(value: &str) -> Result<Self, ValidationError> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| ValidationError::invalid_format("timestamp", e.to_string()))
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Checks if this timestamp is before another.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }

    /// Checks if this timestamp is after another.
    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.0 > other.0
    }

    /// Creates a new timestamp by adding a signed number of seconds.
    ///
    /// Saturates at the representable range instead of panicking.
    pub fn plus_secs(&self, secs: i64) -> Self {
        let bounded = secs.clamp(-MAX_OFFSET_SECS, MAX_OFFSET_SECS);
        match self.0.checked_add_signed(Duration::seconds(bounded)) {
            Some(moved) => Self(moved),
            None if secs < 0 => Self(DateTime::<Utc>::MIN_UTC),
            None => Self(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Creates a new timestamp by subtracting the specified number of hours.
    pub fn minus_hours(&self, hours: i64) -> Self {
        self.plus_secs(hours.saturating_mul(3600).saturating_neg())
    }

    /// The UTC calendar date this timestamp falls on.
    pub fn utc_date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    /// The UTC calendar month this timestamp falls in.
    pub fn month_period(&self) -> MonthPeriod {
        MonthPeriod::from_parts(self.0.year(), self.0.month())
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn timestamp_now_creates_current_time() {
        let before = Utc::now();
        let ts = Timestamp::now();
        let after = Utc::now();

        assert!(ts.as_datetime() >= &before);
        assert!(ts.as_datetime() <= &after);
    }

    #[test]
    fn timestamp_ordering_works() {
        let ts1 = Timestamp::now();
        sleep(std::time::Duration::from_millis(5));
        let ts2 = Timestamp::now();

        assert!(ts1.is_before(&ts2));
        assert!(ts2.is_after(&ts1));
    }

    #[test]
    fn parse_rfc3339_normalizes_to_utc() {
        let ts = Timestamp::parse_rfc3339("2024-01-31T23:30:00-02:00").unwrap();
        assert_eq!(ts.utc_date(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(ts.month_period(), MonthPeriod::new(2024, 2).unwrap());
    }

    #[test]
    fn parse_rfc3339_rejects_garbage() {
        assert!(Timestamp::parse_rfc3339("yesterday").is_err());
    }

    #[test]
    fn timestamp_serializes_as_rfc3339_string() {
        let ts = Timestamp::parse_rfc3339("2024-01-15T10:30:00Z").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert!(json.contains("2024-01-15T10:30:00"));
    }

    #[test]
    fn huge_offsets_saturate() {
        let ts = Timestamp::now();
        assert_eq!(ts.plus_secs(i64::MIN), Timestamp::from_datetime(DateTime::<Utc>::MIN_UTC));
        assert_eq!(ts.plus_secs(i64::MAX), Timestamp::from_datetime(DateTime::<Utc>::MAX_UTC));
        assert_eq!(ts.minus_hours(i64::MAX), Timestamp::from_datetime(DateTime::<Utc>::MIN_UTC));
    }

    #[test]
    fn minus_hours_moves_backwards() {
        let ts = Timestamp::parse_rfc3339("2024-01-15T10:00:00Z").unwrap();
        assert_eq!(ts.minus_hours(10).utc_date(), ts.utc_date());
        assert!(ts.minus_hours(11).utc_date() < ts.utc_date());
    }
}
