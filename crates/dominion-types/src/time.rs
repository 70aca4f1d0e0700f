//! Timestamps for expiry tracking.
//!
//! All time-bound state (combat tags, spawn protection, teleport warmup
//! and cooldown) stores absolute [`Timestamp`] values in milliseconds.
//! Timestamps are produced exclusively by the engine's injected clock, so
//! tests can drive time deterministically.

use serde::{Deserialize, Serialize};

/// An absolute point in time, in milliseconds since the clock epoch.
///
/// All arithmetic saturates; expiry math never wraps.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The zero timestamp (clock epoch).
    pub const ZERO: Self = Self(0);

    /// Create a timestamp from milliseconds since the clock epoch.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Return the raw millisecond value.
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Return this timestamp advanced by `millis`, saturating at the
    /// representable maximum.
    pub const fn saturating_add_millis(self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Milliseconds from `self` until `later`, or 0 if `later` is not
    /// actually later.
    pub const fn millis_until(self, later: Self) -> u64 {
        later.0.saturating_sub(self.0)
    }

    /// Whether this timestamp lies strictly after `other`.
    pub const fn is_after(self, other: Self) -> bool {
        self.0 > other.0
    }
}

impl core::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn add_saturates() {
        let t = Timestamp::from_millis(u64::MAX - 1);
        assert_eq!(t.saturating_add_millis(100), Timestamp::from_millis(u64::MAX));
    }

    #[test]
    fn millis_until_clamps_to_zero() {
        let early = Timestamp::from_millis(100);
        let late = Timestamp::from_millis(350);
        assert_eq!(early.millis_until(late), 250);
        assert_eq!(late.millis_until(early), 0);
    }

    #[test]
    fn ordering_is_by_value() {
        assert!(Timestamp::from_millis(2).is_after(Timestamp::from_millis(1)));
        assert!(!Timestamp::from_millis(1).is_after(Timestamp::from_millis(1)));
    }
}
