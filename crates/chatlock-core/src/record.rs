//! Owner record: the gate's view of a user.

use serde::{Deserialize, Serialize};

use crate::{entry::LockEntry, id::UserId};

/// PIN hash and lock entries of one user.
///
/// # Invariants
///
/// - At most one entry per peer
/// - Entries are never removed, only flipped between locked and unlocked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRecord {
    owner_id: UserId,
    pin_hash: Option<String>,
    entries: Vec<LockEntry>,
}

impl OwnerRecord {
    /// Record with no PIN and no entries.
    pub fn new(owner_id: UserId) -> Self {
        Self { owner_id, pin_hash: None, entries: Vec::new() }
    }

    /// Owner this record belongs to.
    pub fn owner_id(&self) -> &UserId {
        &self.owner_id
    }

    /// Encoded PIN hash, if a PIN is set.
    pub fn pin_hash(&self) -> Option<&str> {
        self.pin_hash.as_deref()
    }

    /// Replace the PIN hash.
    pub fn set_pin_hash(&mut self, hash: String) {
        self.pin_hash = Some(hash);
    }

    /// Entry for `peer`, if one was ever created.
    pub fn entry(&self, peer: &UserId) -> Option<&LockEntry> {
        self.entries.iter().find(|entry| entry.peer_id() == peer)
    }

    /// Entry for `peer`, created unlocked on first use.
    pub fn entry_mut(&mut self, peer: &UserId) -> &mut LockEntry {
        let index = match self.entries.iter().position(|entry| entry.peer_id() == peer) {
            Some(index) => index,
            None => {
                self.entries.push(LockEntry::new(peer.clone()));
                self.entries.len() - 1
            },
        };
        &mut self.entries[index]
    }

    /// All entries in creation order.
    pub fn entries(&self) -> &[LockEntry] {
        &self.entries
    }

    /// Peers whose entry is locked, in creation order.
    pub fn locked_peers(&self) -> Vec<UserId> {
        self.entries.iter().filter(|e| e.is_locked()).map(|e| e.peer_id().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[test]
    fn entry_mut_creates_once() {
        let mut record = OwnerRecord::new(id("alice"));

        record.entry_mut(&id("bob")).lock();
        record.entry_mut(&id("bob"));

        assert_eq!(record.entries().len(), 1);
        assert!(record.entry(&id("bob")).is_some_and(LockEntry::is_locked));
    }

    #[test]
    fn locked_peers_preserves_order() {
        let mut record = OwnerRecord::new(id("alice"));
        record.entry_mut(&id("carol")).lock();
        record.entry_mut(&id("bob"));
        record.entry_mut(&id("dave")).lock();

        assert_eq!(record.locked_peers(), vec![id("carol"), id("dave")]);
    }
}
