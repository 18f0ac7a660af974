//! Microsecond-precision timestamp type
//!
//! Both bitemporal axes use this type: effective time (when a fact became true)
//! and entry time (when the store recorded it).
//!
//! ## Precision
//!
//! Timestamps are stored as microseconds since Unix epoch (1970-01-01 00:00:00 UTC).
//!
//! ## Unbounded
//!
//! `Timestamp::MAX` doubles as "+infinity": it is the default read bound, and
//! the value carried by records that have never been written.
//!
//! ```
//! use vellum_core::Timestamp;
//!
//! let now = Timestamp::now();
//! assert!(now < Timestamp::MAX);
//! assert!(Timestamp::MAX.is_unbounded());
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Microsecond-precision timestamp
///
/// ## Invariants
///
/// - Timestamps are always non-negative (u64)
/// - Timestamps are always in microseconds
/// - `MAX` compares greater than every real instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Unix epoch (1970-01-01 00:00:00 UTC)
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Unbounded ("+infinity")
    pub const MAX: Timestamp = Timestamp(u64::MAX);

    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a timestamp for the current moment
    ///
    /// Returns epoch if the system clock is before Unix epoch.
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

    /// Create a timestamp from seconds since epoch
    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        Timestamp(secs.saturating_mul(1_000_000))
    }

    /// Create from a signed column value, clamping negatives to epoch
    ///
    /// `i64::MAX` maps back to `Timestamp::MAX`.
    pub const fn from_db(value: i64) -> Self {
        if value == i64::MAX {
            Timestamp::MAX
        } else if value < 0 {
            Timestamp::EPOCH
        } else {
            Timestamp(value as u64)
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get microseconds since Unix epoch
    #[inline]
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Get seconds since Unix epoch (truncates)
    #[inline]
    pub const fn as_secs(&self) -> u64 {
        self.0 / 1_000_000
    }

    /// Signed column value; `MAX` and anything above `i64::MAX` saturate
    pub const fn to_db(&self) -> i64 {
        if self.0 > i64::MAX as u64 {
            i64::MAX
        } else {
            self.0 as i64
        }
    }

    /// True for the "+infinity" bound
    #[inline]
    pub const fn is_unbounded(&self) -> bool {
        self.0 == u64::MAX
    }

    /// Convert to a calendar instant; `None` for `MAX` or out-of-range values
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        if self.is_unbounded() {
            return None;
        }
        let micros = i64::try_from(self.0).ok()?;
        Utc.timestamp_micros(micros).single()
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    /// The next representable instant
    #[inline]
    pub const fn next(&self) -> Self {
        Timestamp(self.0.saturating_add(1))
    }

    /// The previous representable instant
    #[inline]
    pub const fn prev(&self) -> Self {
        Timestamp(self.0.saturating_sub(1))
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::MAX
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unbounded() {
            return write!(f, "+inf");
        }
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}us", self.0),
        }
    }
}

// ============================================================================
// From Implementations
// ============================================================================

impl From<u64> for Timestamp {
    /// Create from raw microseconds
    fn from(micros: u64) -> Self {
        Timestamp::from_micros(micros)
    }
}

impl From<Timestamp> for u64 {
    /// Extract raw microseconds
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    /// Instants before the epoch clamp to `EPOCH`
    fn from(dt: DateTime<Utc>) -> Self {
        Timestamp::from_db(dt.timestamp_micros())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_epoch() {
        assert_eq!(Timestamp::EPOCH.as_micros(), 0);
        assert_eq!(Timestamp::EPOCH.as_secs(), 0);
    }

    #[test]
    fn test_default_is_unbounded() {
        assert!(Timestamp::default().is_unbounded());
        assert!(Timestamp::now() < Timestamp::default());
    }

    #[test]
    fn test_db_conversion_saturates() {
        assert_eq!(Timestamp::MAX.to_db(), i64::MAX);
        assert_eq!(Timestamp::from_db(i64::MAX), Timestamp::MAX);
        assert_eq!(Timestamp::from_db(-5), Timestamp::EPOCH);

        let ts = Timestamp::from_secs(1_700_000_000);
        assert_eq!(Timestamp::from_db(ts.to_db()), ts);
    }

    #[test]
    fn test_datetime_conversion() {
        let ts = Timestamp::from_micros(1_700_000_000_123_456);
        let dt = ts.to_datetime().unwrap();
        assert_eq!(Timestamp::from(dt), ts);
        assert!(Timestamp::MAX.to_datetime().is_none());
    }

    #[test]
    fn test_next_prev() {
        let ts = Timestamp::from_micros(10);
        assert_eq!(ts.next().as_micros(), 11);
        assert_eq!(ts.prev().as_micros(), 9);
        assert_eq!(Timestamp::MAX.next(), Timestamp::MAX);
        assert_eq!(Timestamp::EPOCH.prev(), Timestamp::EPOCH);
    }

    #[test]
    fn test_display() {
        assert_eq!(Timestamp::MAX.to_string(), "+inf");
        assert!(Timestamp::EPOCH.to_string().starts_with("1970-01-01T00:00:00"));
    }

    #[test]
    fn test_serde_is_plain_integer() {
        let json = serde_json::to_string(&Timestamp::from_micros(42)).unwrap();
        assert_eq!(json, "42");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn db_conversion_preserves_order(a in 0..i64::MAX as u64, b in 0..i64::MAX as u64) {
                let (a, b) = (Timestamp::from_micros(a), Timestamp::from_micros(b));
                prop_assert_eq!(a.cmp(&b).is_le(), a.to_db() <= b.to_db());
            }
        }
    }
}
