//! # Temporal Types: UTC Timestamps and Care Windows
//!
//! [`Timestamp`] is UTC-only and truncated to millisecond precision. The
//! activity ledger relies on millisecond resolution to keep per-session
//! ordering strictly increasing, so every instant in the system passes
//! through this type.
//!
//! [`CareWindow`] is the booked care interval, half-open `[start, end)`.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A UTC timestamp with millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated to milliseconds.
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// From a `chrono::DateTime<Utc>`, truncating sub-millisecond digits.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_millis(dt))
    }

    /// Parse an RFC 3339 string with a `Z` suffix.
    ///
    /// Offsets other than `Z`, including `+00:00`, are rejected.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if !s.ends_with('Z') {
            return Err(ValidationError::InvalidTimestamp {
                value: s.to_string(),
                reason: "must use Z suffix (UTC only)".to_string(),
            });
        }
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| ValidationError::InvalidTimestamp {
            value: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_utc(dt.with_timezone(&Utc)))
    }

    /// From Unix epoch milliseconds.
    pub fn from_epoch_millis(millis: i64) -> Result<Self, ValidationError> {
        DateTime::from_timestamp_millis(millis)
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidTimestamp {
                value: millis.to_string(),
                reason: "out of range".to_string(),
            })
    }

    /// Unix epoch milliseconds.
    pub fn epoch_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Calendar date (UTC).
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    /// Shift by a signed duration, saturating at the representable range.
    pub fn plus(&self, delta: Duration) -> Self {
        Self::from_utc(self.0.checked_add_signed(delta).unwrap_or(self.0))
    }

    /// The instant one millisecond later.
    pub fn next_millisecond(&self) -> Self {
        self.plus(Duration::milliseconds(1))
    }

    /// Signed duration `self - earlier`.
    pub fn since(&self, earlier: Timestamp) -> Duration {
        self.0.signed_duration_since(earlier.0)
    }

    /// ISO 8601 with millisecond digits and `Z`, e.g. `2026-01-15T12:00:00.250Z`.
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

fn truncate_to_millis(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(dt.timestamp_millis()).unwrap_or(dt)
}

/// The booked care interval, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CareWindow {
    start: Timestamp,
    end: Timestamp,
}

impl CareWindow {
    /// Build a window. `end` must be strictly after `start`.
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::InvalidWindow {
                start: start.to_iso8601(),
                end: end.to_iso8601(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    /// The booking date, taken from the window start.
    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn duration(&self) -> Duration {
        self.end.since(self.start)
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    /// Whether two windows share any instant. Touching windows do not overlap.
    pub fn overlaps(&self, other: &CareWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        self.start <= ts && ts < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn now_is_millisecond_aligned() {
        let t = Timestamp::now();
        assert_eq!(t.as_datetime().nanosecond() % 1_000_000, 0);
    }

    #[test]
    fn from_utc_truncates_micros() {
        let dt = Utc
            .with_ymd_and_hms(2026, 3, 1, 18, 0, 0)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        let t = Timestamp::from_utc(dt);
        assert_eq!(t.to_iso8601(), "2026-03-01T18:00:00.123Z");
    }

    #[test]
    fn parse_rejects_offsets() {
        assert!(Timestamp::parse("2026-03-01T18:00:00+00:00").is_err());
        assert!(Timestamp::parse("2026-03-01T18:00:00+05:30").is_err());
        assert!(Timestamp::parse("tomorrow").is_err());
    }

    #[test]
    fn next_millisecond_is_strictly_later() {
        let t = ts("2026-03-01T18:00:00Z");
        let n = t.next_millisecond();
        assert!(n > t);
        assert_eq!(n.epoch_millis() - t.epoch_millis(), 1);
    }

    #[test]
    fn epoch_millis_roundtrip() {
        let t = ts("2026-03-01T18:00:00.500Z");
        assert_eq!(Timestamp::from_epoch_millis(t.epoch_millis()).unwrap(), t);
    }

    #[test]
    fn window_requires_positive_duration() {
        let a = ts("2026-03-01T18:00:00Z");
        assert!(CareWindow::new(a, a).is_err());
        assert!(CareWindow::new(a.plus(Duration::hours(1)), a).is_err());
        let w = CareWindow::new(a, a.plus(Duration::hours(4))).unwrap();
        assert_eq!(w.duration_minutes(), 240);
        assert_eq!(w.date(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
    }

    #[test]
    fn window_overlap_is_half_open() {
        let base = ts("2026-03-01T18:00:00Z");
        let w1 = CareWindow::new(base, base.plus(Duration::hours(2))).unwrap();
        let touching =
            CareWindow::new(base.plus(Duration::hours(2)), base.plus(Duration::hours(3))).unwrap();
        let inside = CareWindow::new(
            base.plus(Duration::minutes(30)),
            base.plus(Duration::minutes(90)),
        )
        .unwrap();
        assert!(!w1.overlaps(&touching));
        assert!(w1.overlaps(&inside));
        assert!(inside.overlaps(&w1));
        assert!(w1.contains(base));
        assert!(!w1.contains(w1.end()));
    }

    proptest::proptest! {
        #[test]
        fn overlap_is_symmetric(a in 0i64..10_000, la in 1i64..500, b in 0i64..10_000, lb in 1i64..500) {
            let base = ts("2026-03-01T00:00:00Z");
            let w1 = CareWindow::new(base.plus(Duration::minutes(a)), base.plus(Duration::minutes(a + la))).unwrap();
            let w2 = CareWindow::new(base.plus(Duration::minutes(b)), base.plus(Duration::minutes(b + lb))).unwrap();
            proptest::prop_assert_eq!(w1.overlaps(&w2), w2.overlaps(&w1));
            proptest::prop_assert!(w1.overlaps(&w1));
        }
    }
}
