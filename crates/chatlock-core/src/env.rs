//! Environment abstraction for deterministic testing.
//!
//! Decouples gate logic from system resources (time, randomness). Production
//! uses the wall clock and OS entropy; simulation uses a manual clock and a
//! seeded RNG so throttling and grant expiry can be tested without sleeping.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Abstract environment providing time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time.
    ///
    /// Wall-clock rather than monotonic because timestamps are persisted
    /// (cooldowns, attempt history) and embedded in grant tokens.
    fn now(&self) -> Timestamp;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}

/// Milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Timestamp from Unix milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Unix milliseconds.
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// `self + duration`, saturating at `u64::MAX` milliseconds.
    pub fn saturating_add(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration_millis(duration)))
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub fn saturating_since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Whole milliseconds in `duration`, saturating.
pub(crate) fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturating_add_adds_millis() {
        let t = Timestamp::from_millis(1_000);
        assert_eq!(t.saturating_add(Duration::from_secs(15)), Timestamp::from_millis(16_000));
    }

    #[test]
    fn saturating_add_does_not_wrap() {
        let t = Timestamp::from_millis(u64::MAX - 1);
        assert_eq!(t.saturating_add(Duration::from_secs(1)).as_millis(), u64::MAX);
    }

    #[test]
    fn since_is_zero_when_earlier_is_later() {
        let early = Timestamp::from_millis(10);
        let late = Timestamp::from_millis(25);

        assert_eq!(late.saturating_since(early), Duration::from_millis(15));
        assert_eq!(early.saturating_since(late), Duration::ZERO);
    }
}
