//! Simulated environment: manual clock and seeded RNG.

#![allow(clippy::disallowed_types, reason = "Synchronous RNG access only")]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chatlock_core::{Environment, Timestamp};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Start of simulated time (2024-01-01T00:00:00Z), so timestamps look real
const EPOCH_MS: u64 = 1_704_067_200_000;

/// Deterministic [`Environment`] for tests.
///
/// Time only moves when [`advance`](Self::advance) is called. Clones share
/// the clock and the RNG stream.
#[derive(Clone)]
pub struct SimEnv {
    now_ms: Arc<AtomicU64>,
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl SimEnv {
    /// Environment seeded with 0.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment with a specific RNG seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(EPOCH_MS)),
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.now_ms.fetch_add(millis, Ordering::SeqCst);
    }

    /// Milliseconds elapsed since the simulation started.
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.now_ms.load(Ordering::SeqCst) - EPOCH_MS)
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.now_ms.load(Ordering::SeqCst))
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        // A poisoned lock still holds a usable RNG
        let mut rng = self.rng.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        rng.fill_bytes(buffer);
    }
}
