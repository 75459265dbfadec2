#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use super::{Storage, StorageError};
use crate::{id::UserId, record::OwnerRecord};

type SharedRecord = Arc<Mutex<OwnerRecord>>;

/// In-memory storage implementation for testing and simulation
///
/// One mutex per owner record, plus a mutex over the map itself. The map lock
/// is held only long enough to find the record, so updates for different
/// owners do not serialize against each other while updates for the same
/// owner do. A poisoned lock surfaces as `StorageError::Io`.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    owners: Arc<Mutex<HashMap<UserId, SharedRecord>>>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of owner records.
    pub fn owner_count(&self) -> usize {
        self.owners.lock().map_or(0, |owners| owners.len())
    }

    fn record(&self, owner: &UserId) -> Result<Option<SharedRecord>, StorageError> {
        let owners = self.owners.lock().map_err(|_| poisoned())?;
        Ok(owners.get(owner).cloned())
    }
}

impl Storage for MemoryStorage {
    fn create_owner(&self, owner: &UserId) -> Result<bool, StorageError> {
        let mut owners = self.owners.lock().map_err(|_| poisoned())?;
        if owners.contains_key(owner) {
            return Ok(false);
        }
        owners.insert(owner.clone(), Arc::new(Mutex::new(OwnerRecord::new(owner.clone()))));
        Ok(true)
    }

    fn load_owner(&self, owner: &UserId) -> Result<Option<OwnerRecord>, StorageError> {
        let Some(record) = self.record(owner)? else {
            return Ok(None);
        };
        let record = record.lock().map_err(|_| poisoned())?;
        Ok(Some(record.clone()))
    }

    fn update_owner<T, F>(&self, owner: &UserId, f: F) -> Result<Option<T>, StorageError>
    where
        F: FnOnce(&mut OwnerRecord) -> T,
    {
        let Some(record) = self.record(owner)? else {
            return Ok(None);
        };
        let mut record = record.lock().map_err(|_| poisoned())?;
        Ok(Some(f(&mut record)))
    }

    fn list_owners(&self) -> Result<Vec<UserId>, StorageError> {
        let owners = self.owners.lock().map_err(|_| poisoned())?;
        Ok(owners.keys().cloned().collect())
    }
}

fn poisoned() -> StorageError {
    StorageError::Io("mutex poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn id(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[test]
    fn new_storage_is_empty() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.owner_count(), 0);
        assert_eq!(storage.load_owner(&id("alice")).unwrap(), None);
    }

    #[test]
    fn create_owner_is_idempotent() {
        let storage = MemoryStorage::new();
        assert!(storage.create_owner(&id("alice")).unwrap());

        storage.update_owner(&id("alice"), |r| r.set_pin_hash("hash".into())).unwrap();
        assert!(!storage.create_owner(&id("alice")).unwrap());

        let record = storage.load_owner(&id("alice")).unwrap().unwrap();
        assert_eq!(record.pin_hash(), Some("hash"), "second create must not reset the record");
    }

    #[test]
    fn update_missing_owner_does_not_call_closure() {
        let storage = MemoryStorage::new();
        let mut called = false;

        let result = storage.update_owner(&id("ghost"), |_| called = true).unwrap();

        assert_eq!(result, None);
        assert!(!called);
    }

    #[test]
    fn update_persists_mutation_and_returns_value() {
        let storage = MemoryStorage::new();
        storage.create_owner(&id("alice")).unwrap();

        let locked = storage
            .update_owner(&id("alice"), |r| {
                r.entry_mut(&id("bob")).lock();
                r.locked_peers().len()
            })
            .unwrap();

        assert_eq!(locked, Some(1));
        let record = storage.load_owner(&id("alice")).unwrap().unwrap();
        assert_eq!(record.locked_peers(), vec![id("bob")]);
    }

    #[test]
    fn clones_share_state() {
        let storage = MemoryStorage::new();
        let clone = storage.clone();
        storage.create_owner(&id("alice")).unwrap();

        assert_eq!(clone.list_owners().unwrap(), vec![id("alice")]);
    }

    #[test]
    fn concurrent_updates_are_serialized() {
        let storage = MemoryStorage::new();
        storage.create_owner(&id("alice")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let storage = storage.clone();
                thread::spawn(move || {
                    for j in 0..50 {
                        let peer = id(&format!("peer-{i}-{j}"));
                        storage.update_owner(&id("alice"), |r| r.entry_mut(&peer).lock()).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let record = storage.load_owner(&id("alice")).unwrap().unwrap();
        assert_eq!(record.entries().len(), 400, "no update may be lost");
    }
}
