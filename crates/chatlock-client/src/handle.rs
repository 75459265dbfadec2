//! Handles to decrypted attachments.
//!
//! Decrypted bytes live in a [`HandleRegistry`] and are reachable through a
//! [`MediaHandle`]. A handle releases its bytes when [`MediaHandle::release`]
//! is called or when it is dropped, so plaintext never outlives its consumer.

#![allow(clippy::disallowed_types, reason = "Registry is only touched synchronously")]

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// Identifier of a registered object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chatlock-media:{}", self.0)
    }
}

struct Object {
    bytes: Arc<[u8]>,
    mime_type: String,
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    objects: HashMap<HandleId, Object>,
}

/// Store of decrypted attachments.
///
/// Clones share the same objects.
#[derive(Clone, Default)]
pub struct HandleRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl HandleRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` and return the owning handle.
    pub fn register(&self, bytes: Vec<u8>, mime_type: impl Into<String>) -> MediaHandle {
        let mut state = self.lock();
        state.next_id += 1;
        let id = HandleId(state.next_id);
        let mime_type = mime_type.into();

        state.objects.insert(id, Object { bytes: bytes.into(), mime_type: mime_type.clone() });
        MediaHandle { id, mime_type, registry: self.clone(), released: false }
    }

    /// Bytes of a live object.
    pub fn get(&self, id: HandleId) -> Option<Arc<[u8]>> {
        self.lock().objects.get(&id).map(|object| Arc::clone(&object.bytes))
    }

    /// MIME type of a live object.
    pub fn mime_type(&self, id: HandleId) -> Option<String> {
        self.lock().objects.get(&id).map(|object| object.mime_type.clone())
    }

    /// Number of live objects.
    pub fn live(&self) -> usize {
        self.lock().objects.len()
    }

    fn remove(&self, id: HandleId) -> bool {
        self.lock().objects.remove(&id).is_some()
    }

    // A panic while holding the lock cannot leave the map half-updated
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry").field("live", &self.live()).finish()
    }
}

/// Owning handle to a decrypted attachment.
///
/// Released exactly once: explicitly via [`release`](Self::release), or on
/// drop.
pub struct MediaHandle {
    id: HandleId,
    mime_type: String,
    registry: HandleRegistry,
    released: bool,
}

impl MediaHandle {
    /// Registry id, usable as an object URL.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// MIME type of the plaintext.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Decrypted bytes.
    pub fn bytes(&self) -> Option<Arc<[u8]>> {
        self.registry.get(self.id)
    }

    /// Release the object now.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            if self.registry.remove(self.id) {
                tracing::trace!(handle = %self.id, "Media handle released");
            }
        }
    }
}

impl Drop for MediaHandle {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaHandle")
            .field("id", &self.id)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}
