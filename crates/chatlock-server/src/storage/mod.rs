//! Durable storage backends.
//!
//! The [`Storage`] trait and the in-memory backends live in `chatlock-core`;
//! this module adds the redb backend used by the binary. It also persists
//! sealed attachments through [`MediaStore`](crate::media::MediaStore).

mod redb;

pub use chatlock_core::{ChaoticStorage, MemoryStorage, Storage, StorageError};

pub use self::redb::RedbStorage;
