//! Production environment: wall clock and OS entropy.
//!
//! Timestamps are wall-clock milliseconds because they are persisted in owner
//! records and embedded in grant tokens.

use chatlock_core::{Environment, Timestamp};

/// Production [`Environment`] using `SystemTime` and getrandom.
///
/// # Panics
///
/// Panics if the OS RNG fails. Salts, ivs and PIN hashes depend on it, and a
/// server without it cannot operate securely.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Timestamp {
        // Before-epoch clocks read as the epoch
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        Timestamp::from_millis(millis)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - server cannot operate securely");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn time_is_after_2024() {
        let now = SystemEnv::new().now();
        assert!(now.as_millis() > 1_704_067_200_000);
    }

    #[test]
    fn time_does_not_run_backwards_across_a_sleep() {
        let env = SystemEnv::new();

        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(5));
        let t2 = env.now();

        assert!(t2 >= t1);
    }

    #[test]
    fn random_bytes_differ() {
        let env = SystemEnv::new();

        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        env.random_bytes(&mut a);
        env.random_bytes(&mut b);

        assert_ne!(a, b);
    }
}
