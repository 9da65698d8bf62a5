//! Microsecond-precision timestamp type
//!
//! Timestamps are stored as microseconds since Unix epoch and are the
//! canonical time representation in the store: creation/updated dates on
//! domain documents, lock creation dates, and TTL expiry arithmetic all
//! use this type.
//!
//! Never expose raw arithmetic. Use explicit constructors:
//!
//! ```
//! use arbor_core::Timestamp;
//!
//! let now = Timestamp::now();
//! let from_secs = Timestamp::from_secs(1000);
//! let from_micros = Timestamp::from_micros(1_000_000_000);
//! ```

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Microsecond-precision timestamp
///
/// Represents a point in time as microseconds since Unix epoch.
///
/// ## Invariants
///
/// - Timestamps are always non-negative (u64)
/// - Timestamps are always in microseconds
/// - Timestamps are comparable and orderable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Unix epoch (1970-01-01 00:00:00 UTC)
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Maximum representable timestamp
    pub const MAX: Timestamp = Timestamp(u64::MAX);

    /// Create a timestamp for the current moment
    ///
    /// Uses system time. Returns epoch (0) if system clock is before Unix
    /// epoch (e.g. clock went backwards due to NTP adjustment).
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_micros() as u64)
    }

    /// Create a timestamp from microseconds since epoch
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Timestamp(micros)
    }

    /// Create a timestamp from milliseconds since epoch
    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Timestamp(millis.saturating_mul(1_000))
    }

    /// Create a timestamp from seconds since epoch
    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        Timestamp(secs.saturating_mul(1_000_000))
    }

    /// Get microseconds since Unix epoch
    #[inline]
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Get milliseconds since Unix epoch (truncates)
    #[inline]
    pub const fn as_millis(&self) -> u64 {
        self.0 / 1_000
    }

    /// Get seconds since Unix epoch (truncates)
    #[inline]
    pub const fn as_secs(&self) -> u64 {
        self.0 / 1_000_000
    }

    /// Compute duration since an earlier timestamp
    ///
    /// Returns `None` if `earlier` is actually later than `self`.
    pub fn duration_since(&self, earlier: Timestamp) -> Option<Duration> {
        if self.0 >= earlier.0 {
            Some(Duration::from_micros(self.0 - earlier.0))
        } else {
            None
        }
    }

    /// Add a duration to this timestamp, saturating at the maximum
    ///
    /// Used for TTL expiry arithmetic (creation date + time-to-live).
    pub fn saturating_add(&self, duration: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(duration.as_micros() as u64))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_constructors() {
        assert_eq!(Timestamp::from_secs(1).as_micros(), 1_000_000);
        assert_eq!(Timestamp::from_millis(1).as_micros(), 1_000);
        assert_eq!(Timestamp::from_micros(42).as_micros(), 42);
    }

    #[test]
    fn test_timestamp_truncating_accessors() {
        let ts = Timestamp::from_micros(1_234_567);
        assert_eq!(ts.as_millis(), 1_234);
        assert_eq!(ts.as_secs(), 1);
    }

    #[test]
    fn test_timestamp_now_is_after_epoch() {
        assert!(Timestamp::now() > Timestamp::EPOCH);
    }

    #[test]
    fn test_timestamp_ordering() {
        let earlier = Timestamp::from_secs(100);
        let later = Timestamp::from_secs(200);
        assert!(earlier < later);
        assert_eq!(later.duration_since(earlier), Some(Duration::from_secs(100)));
        assert_eq!(earlier.duration_since(later), None);
    }

    #[test]
    fn test_timestamp_saturating_add() {
        let ts = Timestamp::from_secs(10);
        assert_eq!(
            ts.saturating_add(Duration::from_secs(5)),
            Timestamp::from_secs(15)
        );
        assert_eq!(Timestamp::MAX.saturating_add(Duration::from_secs(1)), Timestamp::MAX);
    }

    #[test]
    fn test_timestamp_serializes_as_number() {
        let ts = Timestamp::from_micros(123_456);
        let json = serde_json::to_value(ts).unwrap();
        assert_eq!(json, serde_json::json!(123_456));
        let restored: Timestamp = serde_json::from_value(json).unwrap();
        assert_eq!(restored, ts);
    }
}
