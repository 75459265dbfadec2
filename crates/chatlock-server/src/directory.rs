//! Peer profile lookups for the locked-chat list.
//!
//! Profiles belong to the external account store. [`CachedDirectory`] keeps
//! recent lookups in a [`BoundedCache`] so listing locked chats does not hit
//! the store once per peer on every request.

#![allow(clippy::disallowed_types, reason = "Cache is only touched synchronously")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, RwLock},
};

use chatlock_core::{BoundedCache, Environment, HasId, StorageError, UserId};
use serde::{Deserialize, Serialize};

/// Public profile fields of a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerProfile {
    /// Account id
    #[serde(rename = "_id")]
    pub id: UserId,
    /// Handle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}

impl PeerProfile {
    /// Profile with only an id.
    pub fn bare(id: UserId) -> Self {
        Self { id, username: None, full_name: None, profile_pic: None }
    }
}

impl HasId for PeerProfile {
    fn id(&self) -> &UserId {
        &self.id
    }
}

/// Source of peer profiles.
pub trait PeerDirectory: Clone + Send + Sync + 'static {
    /// Profile of `id`, or `None` if the account is unknown.
    fn profile(&self, id: &UserId) -> Result<Option<PeerProfile>, StorageError>;
}

/// In-memory directory, filled by the host or by tests.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    profiles: Arc<RwLock<HashMap<UserId, PeerProfile>>>,
}

impl StaticDirectory {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a profile.
    pub fn insert(&self, profile: PeerProfile) -> Result<(), StorageError> {
        self.profiles
            .write()
            .map_err(|_| StorageError::Io("directory lock poisoned".to_string()))?
            .insert(profile.id.clone(), profile);
        Ok(())
    }
}

impl PeerDirectory for StaticDirectory {
    fn profile(&self, id: &UserId) -> Result<Option<PeerProfile>, StorageError> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| StorageError::Io("directory lock poisoned".to_string()))?;
        Ok(profiles.get(id).cloned())
    }
}

/// Directory fronted by a bounded TTL cache.
///
/// Only hits are cached; an unknown peer is looked up again next time.
#[derive(Clone)]
pub struct CachedDirectory<D, E> {
    inner: D,
    env: E,
    cache: Arc<Mutex<BoundedCache<UserId, PeerProfile>>>,
}

impl<D: PeerDirectory, E: Environment> CachedDirectory<D, E> {
    /// Cache at most `capacity` profiles from `inner`, each for `ttl`.
    pub fn new(inner: D, env: E, capacity: usize, ttl: std::time::Duration) -> Self {
        Self { inner, env, cache: Arc::new(Mutex::new(BoundedCache::new(capacity, ttl))) }
    }

    /// The wrapped directory.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Number of cached profiles.
    pub fn cached(&self) -> usize {
        self.cache.lock().map_or(0, |cache| cache.len())
    }

    /// Drop any cached profile for `id`.
    pub fn invalidate(&self, id: &UserId) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.invalidate(id);
        }
    }

    fn lock_cache(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BoundedCache<UserId, PeerProfile>>, StorageError> {
        self.cache.lock().map_err(|_| StorageError::Io("directory cache poisoned".to_string()))
    }
}

impl<D: PeerDirectory, E: Environment> PeerDirectory for CachedDirectory<D, E> {
    fn profile(&self, id: &UserId) -> Result<Option<PeerProfile>, StorageError> {
        let now = self.env.now();
        if let Some(profile) = self.lock_cache()?.get(id, now) {
            return Ok(Some(profile));
        }

        // Lookup runs without the cache lock held
        let profile = self.inner.profile(id)?;
        if let Some(profile) = &profile {
            self.lock_cache()?.insert(id.clone(), profile.clone(), now);
        }
        Ok(profile)
    }
}

impl<D, E> std::fmt::Debug for CachedDirectory<D, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedDirectory").finish_non_exhaustive()
    }
}
