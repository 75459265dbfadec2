//! Attachment upload and gated read path.
//!
//! Attachments are sealed on upload with a key derived from the server master
//! key, a fresh salt and the message id. Neither the key nor the plaintext is
//! stored. On read the gate is consulted first; only then is the stored object
//! touched, either to hand out its metadata (including the recomputed key) or
//! its `ciphertext || tag` blob.

#![allow(clippy::disallowed_types, reason = "Store is only touched synchronously")]

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use chatlock_core::{AccessGate, Environment, GateError, PinHasher, Storage, StorageError, UserId};
use chatlock_crypto::{
    EncryptedObject, IV_SIZE, KEY_SIZE, MediaContext, MediaMetadata, SALT_SIZE, derive_media_key,
    seal_media,
};
use serde::{Deserialize, Serialize};

use crate::error::MediaError;

/// Context field name for image attachments
pub const IMAGE_FIELD: &str = "image";

/// A sealed attachment and the conversation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMedia {
    /// Uploader
    pub sender: UserId,
    /// Other party of the conversation
    pub recipient: UserId,
    /// Sealed bytes and their parameters
    pub object: EncryptedObject,
}

impl StoredMedia {
    /// True if this attachment belongs to the conversation between `a` and
    /// `b`, in either direction.
    pub fn belongs_to(&self, a: &UserId, b: &UserId) -> bool {
        (&self.sender == a && &self.recipient == b) || (&self.sender == b && &self.recipient == a)
    }
}

/// Persistence for sealed attachments, keyed by message id.
pub trait MediaStore: Clone + Send + Sync + 'static {
    /// Store `media` under `message_id`, replacing any previous value.
    fn put_media(&self, message_id: &str, media: &StoredMedia) -> Result<(), StorageError>;

    /// Attachment for `message_id`, if any.
    fn get_media(&self, message_id: &str) -> Result<Option<StoredMedia>, StorageError>;

    /// Remove the attachment. Returns true if one existed.
    fn delete_media(&self, message_id: &str) -> Result<bool, StorageError>;
}

/// In-memory attachment store.
#[derive(Debug, Clone, Default)]
pub struct MemoryMediaStore {
    objects: Arc<RwLock<HashMap<String, StoredMedia>>>,
}

impl MemoryMediaStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Io("media store lock poisoned".to_string())
}

impl MediaStore for MemoryMediaStore {
    fn put_media(&self, message_id: &str, media: &StoredMedia) -> Result<(), StorageError> {
        self.objects.write().map_err(poisoned)?.insert(message_id.to_string(), media.clone());
        Ok(())
    }

    fn get_media(&self, message_id: &str) -> Result<Option<StoredMedia>, StorageError> {
        Ok(self.objects.read().map_err(poisoned)?.get(message_id).cloned())
    }

    fn delete_media(&self, message_id: &str) -> Result<bool, StorageError> {
        Ok(self.objects.write().map_err(poisoned)?.remove(message_id).is_some())
    }
}

/// Upload and gated read of attachments.
#[derive(Clone)]
pub struct MediaService<E, S, H, M> {
    gate: AccessGate<E, S, H>,
    store: M,
    master_key: [u8; KEY_SIZE],
}

impl<E, S, H, M> MediaService<E, S, H, M>
where
    E: Environment,
    S: Storage,
    H: PinHasher,
    M: MediaStore,
{
    /// Service reading through `gate` and sealing under `master_key`.
    pub fn new(gate: AccessGate<E, S, H>, store: M, master_key: [u8; KEY_SIZE]) -> Self {
        Self { gate, store, master_key }
    }

    /// The attachment store.
    pub fn store(&self) -> &M {
        &self.store
    }

    /// Seal `plaintext` and store it as the image of `message_id`.
    ///
    /// Draws a fresh salt and iv from the environment, so no (key, iv) pair is
    /// ever reused.
    pub fn upload(
        &self,
        message_id: &str,
        sender: &UserId,
        recipient: &UserId,
        plaintext: &[u8],
        mime_type: &str,
    ) -> Result<StoredMedia, MediaError> {
        if message_id.trim().is_empty() {
            return Err(GateError::Validation("message id is required".to_string()).into());
        }
        if mime_type.trim().is_empty() {
            return Err(GateError::Validation("mime type is required".to_string()).into());
        }

        let mut salt = [0u8; SALT_SIZE];
        let mut iv = [0u8; IV_SIZE];
        self.gate.env().random_bytes(&mut salt);
        self.gate.env().random_bytes(&mut iv);

        let context = MediaContext::new(message_id, IMAGE_FIELD);
        let object = seal_media(&self.master_key, &context, plaintext, mime_type, salt, iv);
        let media = StoredMedia { sender: sender.clone(), recipient: recipient.clone(), object };

        self.store.put_media(message_id, &media)?;
        tracing::info!(
            message_id,
            sender = %sender,
            bytes = plaintext.len(),
            mime_type,
            "Attachment sealed"
        );

        Ok(media)
    }

    /// Inline metadata for `message_id`, including the recomputed key.
    ///
    /// `reader` is the requesting user, `peer` the other party of the
    /// conversation. Fails with `Locked` before the object is read if the
    /// reader has locked the conversation and presents no valid grant.
    pub fn metadata(
        &self,
        reader: &UserId,
        peer: &UserId,
        message_id: &str,
        token: Option<&str>,
    ) -> Result<MediaMetadata, MediaError> {
        let media = self.gated_fetch(reader, peer, message_id, token)?;

        let context = MediaContext::new(message_id, IMAGE_FIELD);
        let key = derive_media_key(&self.master_key, &context, &media.object.salt);

        Ok(MediaMetadata::new(&key, &media.object, download_url(message_id, peer)))
    }

    /// The `ciphertext || tag` blob of `message_id`, after the gate check.
    pub fn read(
        &self,
        reader: &UserId,
        peer: &UserId,
        message_id: &str,
        token: Option<&str>,
    ) -> Result<EncryptedObject, MediaError> {
        self.gated_fetch(reader, peer, message_id, token).map(|media| media.object)
    }

    /// Delete the attachment of a deleted message.
    pub fn delete(&self, message_id: &str) -> Result<bool, MediaError> {
        let removed = self.store.delete_media(message_id)?;
        if removed {
            tracing::info!(message_id, "Attachment deleted");
        }
        Ok(removed)
    }

    fn gated_fetch(
        &self,
        reader: &UserId,
        peer: &UserId,
        message_id: &str,
        token: Option<&str>,
    ) -> Result<StoredMedia, MediaError> {
        self.gate.require_access(reader, peer, token).inspect_err(|e| {
            if *e == GateError::Locked {
                tracing::debug!(reader = %reader, peer = %peer, message_id, "Locked attachment withheld");
            }
        })?;

        match self.store.get_media(message_id)? {
            Some(media) if media.belongs_to(reader, peer) => Ok(media),
            _ => Err(MediaError::NotFound),
        }
    }
}

impl<E, S, H, M> std::fmt::Debug for MediaService<E, S, H, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaService").field("master_key", &"<redacted>").finish_non_exhaustive()
    }
}

/// Download path of an attachment blob.
pub fn download_url(message_id: &str, peer: &UserId) -> String {
    format!("/messages/image/{message_id}?peer={peer}")
}
