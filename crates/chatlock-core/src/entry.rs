//! Per-peer lock state.
//!
//! # State Machine
//!
//! ```text
//!            lock ok                         verify fail, window full
//! Unlocked ──────────► Locked ─────────────────────────► Cooldown
//!    ▲                 │  ▲                                  │
//!    └─────────────────┘  └──────────── time ────────────────┘
//!         unlock ok
//! ```
//!
//! Cooldown is a sub-state of Locked and lapses lazily: nothing runs when it
//! expires, the next access simply observes `cooldown_until <= now`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{attempts::AttemptWindow, config::GateConfig, env::Timestamp, id::UserId};

/// Lock state of one (owner, peer) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    peer_id: UserId,
    locked: bool,
    failed_attempts: AttemptWindow,
    cooldown_until: Option<Timestamp>,
    grant_epoch: u32,
}

/// Observed state of an entry at some instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Content is readable without a grant
    Unlocked,
    /// Content requires a grant
    Locked,
    /// Locked, and verification is refused for `remaining`
    Cooldown {
        /// Time until verification is accepted again
        remaining: Duration,
    },
}

impl LockEntry {
    /// Fresh unlocked entry for `peer_id`.
    pub fn new(peer_id: UserId) -> Self {
        Self {
            peer_id,
            locked: false,
            failed_attempts: AttemptWindow::new(),
            cooldown_until: None,
            grant_epoch: 0,
        }
    }

    /// Peer this entry guards.
    pub fn peer_id(&self) -> &UserId {
        &self.peer_id
    }

    /// True if content requires a grant.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Grants carrying any other epoch are revoked.
    pub fn grant_epoch(&self) -> u32 {
        self.grant_epoch
    }

    /// Failure history inside the current window.
    pub fn failed_attempts(&self) -> &AttemptWindow {
        &self.failed_attempts
    }

    /// State at `now`.
    pub fn state(&self, now: Timestamp) -> LockState {
        if !self.locked {
            return LockState::Unlocked;
        }
        let remaining = self.cooldown_remaining(now);
        if remaining.is_zero() { LockState::Locked } else { LockState::Cooldown { remaining } }
    }

    /// Time until the cooldown lapses, zero if none is active.
    pub fn cooldown_remaining(&self, now: Timestamp) -> Duration {
        self.cooldown_until.map_or(Duration::ZERO, |until| until.saturating_since(now))
    }

    /// Mark locked and revoke outstanding grants.
    pub fn lock(&mut self) {
        self.locked = true;
        self.bump_epoch();
    }

    /// Mark unlocked, forget failures and cooldown, revoke outstanding grants.
    pub fn unlock(&mut self) {
        self.locked = false;
        self.failed_attempts.clear();
        self.cooldown_until = None;
        self.bump_epoch();
    }

    /// Drop stale failures and a lapsed cooldown.
    pub fn refresh(&mut self, now: Timestamp, config: &GateConfig) {
        if self.cooldown_until.is_some_and(|until| until <= now) {
            self.cooldown_until = None;
        }
        self.failed_attempts.prune(now, config.attempt_window);
    }

    /// Record a failed verification.
    ///
    /// Returns true if the entry entered cooldown.
    pub fn record_failure(&mut self, now: Timestamp, config: &GateConfig) -> bool {
        let count = self.failed_attempts.record(now, config.max_attempts);
        if count >= config.max_attempts {
            self.cooldown_until = Some(now.saturating_add(config.cooldown));
            return true;
        }
        false
    }

    /// Forget failures and cooldown after a successful verification.
    pub fn reset_attempts(&mut self) {
        self.failed_attempts.clear();
        self.cooldown_until = None;
    }

    fn bump_epoch(&mut self) {
        self.grant_epoch = self.grant_epoch.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> LockEntry {
        LockEntry::new(UserId::new("peer").unwrap())
    }

    fn at(millis: u64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    #[test]
    fn new_entry_is_unlocked() {
        let entry = entry();
        assert_eq!(entry.state(at(0)), LockState::Unlocked);
        assert_eq!(entry.cooldown_remaining(at(0)), Duration::ZERO);
    }

    #[test]
    fn lock_and_unlock_bump_epoch() {
        let mut entry = entry();
        entry.lock();
        assert_eq!(entry.grant_epoch(), 1);
        assert!(entry.is_locked());

        entry.lock();
        assert_eq!(entry.grant_epoch(), 2, "re-lock revokes grants too");

        entry.unlock();
        assert_eq!(entry.grant_epoch(), 3);
        assert!(!entry.is_locked());
    }

    #[test]
    fn fifth_failure_enters_cooldown() {
        let config = GateConfig::default();
        let mut entry = entry();
        entry.lock();

        for i in 0..4 {
            assert!(!entry.record_failure(at(i), &config));
        }
        assert!(entry.record_failure(at(4), &config));

        assert_eq!(
            entry.state(at(4)),
            LockState::Cooldown { remaining: config.cooldown },
        );
        assert_eq!(entry.state(at(4).saturating_add(config.cooldown)), LockState::Locked);
    }

    #[test]
    fn refresh_clears_lapsed_cooldown() {
        let config = GateConfig::default();
        let mut entry = entry();
        for i in 0..5 {
            entry.record_failure(at(i), &config);
        }

        entry.refresh(at(4).saturating_add(config.cooldown), &config);

        assert_eq!(entry.cooldown_remaining(at(20_000)), Duration::ZERO);
        assert_eq!(entry.failed_attempts().len(), 5, "failures stay inside the window");
    }

    #[test]
    fn unlock_clears_attempts_and_cooldown() {
        let config = GateConfig::default();
        let mut entry = entry();
        entry.lock();
        for i in 0..5 {
            entry.record_failure(at(i), &config);
        }

        entry.unlock();

        assert!(entry.failed_attempts().is_empty());
        assert_eq!(entry.cooldown_remaining(at(5)), Duration::ZERO);
    }
}
