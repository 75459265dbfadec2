//! Chaotic storage wrapper for fault injection testing
//!
//! Storage wrapper that randomly fails operations to check that the gate and
//! the API surface storage failures as errors instead of panicking or granting
//! access.

use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use super::{Storage, StorageError};
use crate::{id::UserId, record::OwnerRecord};

/// Chaotic storage wrapper that randomly injects failures
///
/// Delegates to an underlying storage implementation but fails operations
/// based on a configured failure rate. A failed `update_owner` never runs its
/// closure, so an injected failure never half-applies a mutation.
#[derive(Clone)]
pub struct ChaoticStorage<S: Storage> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// LCG state for deterministic chaos
    rng_state: Arc<AtomicU64>,
    /// Operation counter
    operation_count: Arc<AtomicUsize>,
}

impl<S: Storage> ChaoticStorage<S> {
    /// Create a new chaotic storage wrapper.
    ///
    /// `failure_rate` is clamped to [0.0, 1.0].
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit seed for reproducible chaos
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        Self {
            inner,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            rng_state: Arc::new(AtomicU64::new(seed)),
            operation_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Underlying storage (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of storage operations attempted.
    pub fn operation_count(&self) -> usize {
        self.operation_count.load(Ordering::Relaxed)
    }

    /// Count the operation and decide whether to fail it.
    fn inject(&self) -> Result<(), StorageError> {
        self.operation_count.fetch_add(1, Ordering::Relaxed);
        if self.next_unit() < self.failure_rate {
            return Err(StorageError::Io("chaotic failure injection".to_string()));
        }
        Ok(())
    }

    /// Next LCG value in [0.0, 1.0)
    fn next_unit(&self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        let step = |state: u64| (A.wrapping_mul(state).wrapping_add(C)) % M;
        let previous = self
            .rng_state
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |s| Some(step(s)))
            .unwrap_or_else(|s| s);

        (step(previous) as f64) / (M as f64)
    }
}

impl<S: Storage> Storage for ChaoticStorage<S> {
    fn create_owner(&self, owner: &UserId) -> Result<bool, StorageError> {
        self.inject()?;
        self.inner.create_owner(owner)
    }

    fn load_owner(&self, owner: &UserId) -> Result<Option<OwnerRecord>, StorageError> {
        self.inject()?;
        self.inner.load_owner(owner)
    }

    fn update_owner<T, F>(&self, owner: &UserId, f: F) -> Result<Option<T>, StorageError>
    where
        F: FnOnce(&mut OwnerRecord) -> T,
    {
        self.inject()?;
        self.inner.update_owner(owner, f)
    }

    fn list_owners(&self) -> Result<Vec<UserId>, StorageError> {
        self.inject()?;
        self.inner.list_owners()
    }
}
