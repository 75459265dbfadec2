//! Storage abstraction for owner records.
//!
//! The trait is synchronous. Lock entries live inside the owner record, so a
//! single record is the unit of atomicity: [`Storage::update_owner`] is the
//! only write path and runs its closure under the backend's concurrency
//! control.

mod chaotic;
mod error;
mod memory;

pub use chaotic::ChaoticStorage;
pub use error::StorageError;
pub use memory::MemoryStorage;

use crate::{id::UserId, record::OwnerRecord};

/// Persistence for owner records.
///
/// Must be Clone (shared by the gate and the API layer), Send + Sync, and
/// synchronous. Implementations share internal state, so clones access the
/// same underlying storage.
pub trait Storage: Clone + Send + Sync + 'static {
    /// Create an empty record for `owner`.
    ///
    /// Idempotent. Returns true if a record was created, false if one already
    /// existed (which is left untouched).
    fn create_owner(&self, owner: &UserId) -> Result<bool, StorageError>;

    /// Snapshot of the record for `owner`.
    ///
    /// Returns `None` if the owner doesn't exist.
    fn load_owner(&self, owner: &UserId) -> Result<Option<OwnerRecord>, StorageError>;

    /// Atomic read-modify-write of the record for `owner`.
    ///
    /// Returns `None` (and does not call `f`) if the owner doesn't exist.
    ///
    /// # Invariants
    ///
    /// - `f` runs at most once
    /// - No other `update_owner` for the same owner interleaves with `f`
    /// - Whatever `f` leaves in the record is persisted, regardless of the
    ///   value it returns
    fn update_owner<T, F>(&self, owner: &UserId, f: F) -> Result<Option<T>, StorageError>
    where
        F: FnOnce(&mut OwnerRecord) -> T;

    /// All owner ids. Order is not guaranteed.
    fn list_owners(&self) -> Result<Vec<UserId>, StorageError>;
}
