//! Redb-backed durable storage.
//!
//! Uses redb's ACID transactions with copy-on-write for crash safety. Owner
//! records and sealed attachments survive server restarts.
//!
//! # Atomicity
//!
//! redb allows one write transaction at a time, so
//! [`update_owner`](Storage::update_owner) reading, modifying and writing a
//! record inside a single write transaction is enough to serialize concurrent
//! updates.

use std::{path::Path, sync::Arc};

use chatlock_core::{OwnerRecord, Storage, StorageError, UserId};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Serialize, de::DeserializeOwned};

use crate::media::{MediaStore, StoredMedia};

/// Table: owners
/// Key: owner id (UTF-8)
/// Value: CBOR-encoded `OwnerRecord`
const OWNERS: TableDefinition<&str, &[u8]> = TableDefinition::new("owners");

/// Table: media
/// Key: message id (UTF-8)
/// Value: CBOR-encoded `StoredMedia`
const MEDIA: TableDefinition<&str, &[u8]> = TableDefinition::new("media");

/// Durable storage backed by redb.
///
/// Thread-safe through redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create a redb database at the given path.
    ///
    /// Creates the OWNERS and MEDIA tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created
    /// (including when another process holds it open).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        let txn = db.begin_write().map_err(io)?;
        {
            let _ = txn.open_table(OWNERS).map_err(io)?;
            let _ = txn.open_table(MEDIA).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl std::fmt::Debug for RedbStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStorage").finish_non_exhaustive()
    }
}

impl Storage for RedbStorage {
    fn create_owner(&self, owner: &UserId) -> Result<bool, StorageError> {
        let txn = self.db.begin_write().map_err(io)?;

        {
            let mut table = txn.open_table(OWNERS).map_err(io)?;
            if table.get(owner.as_str()).map_err(io)?.is_some() {
                return Ok(false);
            }

            let bytes = encode(&OwnerRecord::new(owner.clone()))?;
            table.insert(owner.as_str(), bytes.as_slice()).map_err(io)?;
        }

        txn.commit().map_err(io)?;
        Ok(true)
    }

    fn load_owner(&self, owner: &UserId) -> Result<Option<OwnerRecord>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(OWNERS).map_err(io)?;

        match table.get(owner.as_str()).map_err(io)? {
            Some(value) => decode(value.value()).map(Some),
            None => Ok(None),
        }
    }

    fn update_owner<T, F>(&self, owner: &UserId, f: F) -> Result<Option<T>, StorageError>
    where
        F: FnOnce(&mut OwnerRecord) -> T,
    {
        let txn = self.db.begin_write().map_err(io)?;

        let output = {
            let mut table = txn.open_table(OWNERS).map_err(io)?;

            let mut record: OwnerRecord = match table.get(owner.as_str()).map_err(io)? {
                Some(value) => decode(value.value())?,
                // Dropping the transaction aborts it
                None => return Ok(None),
            };

            let output = f(&mut record);

            let bytes = encode(&record)?;
            table.insert(owner.as_str(), bytes.as_slice()).map_err(io)?;
            output
        };

        txn.commit().map_err(io)?;
        Ok(Some(output))
    }

    fn list_owners(&self) -> Result<Vec<UserId>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(OWNERS).map_err(io)?;

        let mut owners = Vec::new();
        for entry in table.iter().map_err(io)? {
            let (key, _) = entry.map_err(io)?;
            let owner = UserId::new(key.value())
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            owners.push(owner);
        }

        Ok(owners)
    }
}

impl MediaStore for RedbStorage {
    fn put_media(&self, message_id: &str, media: &StoredMedia) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(io)?;

        {
            let mut table = txn.open_table(MEDIA).map_err(io)?;
            let bytes = encode(media)?;
            table.insert(message_id, bytes.as_slice()).map_err(io)?;
        }

        txn.commit().map_err(io)?;
        Ok(())
    }

    fn get_media(&self, message_id: &str) -> Result<Option<StoredMedia>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(MEDIA).map_err(io)?;

        match table.get(message_id).map_err(io)? {
            Some(value) => decode(value.value()).map(Some),
            None => Ok(None),
        }
    }

    fn delete_media(&self, message_id: &str) -> Result<bool, StorageError> {
        let txn = self.db.begin_write().map_err(io)?;

        let removed = {
            let mut table = txn.open_table(MEDIA).map_err(io)?;
            table.remove(message_id).map_err(io)?.is_some()
        };

        txn.commit().map_err(io)?;
        Ok(removed)
    }
}

fn io(err: impl std::fmt::Display) -> StorageError {
    StorageError::Io(err.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(bytes)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    ciborium::from_reader(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}
