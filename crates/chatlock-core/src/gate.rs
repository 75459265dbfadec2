//! The access gate: lock, unlock, PIN verification and read checks.
//!
//! Every mutation is a single [`Storage::update_owner`] call, so PIN checking
//! and attempt accounting for an owner happen atomically. Concurrent
//! verifications cannot slip extra guesses past the throttle.
//!
//! # Ordering
//!
//! lock, unlock and verify check, in order: owner exists (`NotFound`), PIN set
//! (`NoPin`), for verify only the cooldown (`RateLimited`), then the PIN
//! (`InvalidPin`). A verification refused by cooldown never touches the hash.

use std::time::Duration;

use crate::{
    config::GateConfig,
    env::Environment,
    error::GateError,
    grant::{Grant, GrantStore},
    id::UserId,
    pin::{Argon2PinHasher, PinHasher, validate_pin_format},
    record::OwnerRecord,
    storage::Storage,
};

/// Bytes of salt fed to the PIN hasher
const PIN_SALT_SIZE: usize = 16;

/// Observable lock state returned by [`AccessGate::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStatus {
    /// True if the conversation requires a grant
    pub locked: bool,
    /// Time until verification is accepted again, zero if not cooling down
    pub cooldown_remaining: Duration,
}

/// Outcome of a read check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Content may be revealed
    Allowed,
    /// Content must not be revealed
    Denied(DenyReason),
}

/// Why a read was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Locked and no valid grant was presented
    Locked,
}

/// A grant handed out by a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedGrant {
    /// Decoded claims
    pub grant: Grant,
    /// Signed token to hand to the client
    pub token: String,
}

/// Per-conversation access gate.
///
/// Cheap to clone when the environment, storage and hasher are.
#[derive(Debug, Clone)]
pub struct AccessGate<E, S, H = Argon2PinHasher> {
    env: E,
    storage: S,
    hasher: H,
    grants: GrantStore,
    config: GateConfig,
}

impl<E, S, H> AccessGate<E, S, H>
where
    E: Environment,
    S: Storage,
    H: PinHasher,
{
    /// Gate over `storage`, signing grants with `grant_secret`.
    pub fn new(
        env: E,
        storage: S,
        hasher: H,
        grant_secret: impl Into<Vec<u8>>,
        config: GateConfig,
    ) -> Self {
        let grants = GrantStore::new(grant_secret, config.grant_ttl);
        Self { env, storage, hasher, grants, config }
    }

    /// Environment handle.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Tuning parameters.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Create an empty record for `owner` if none exists.
    ///
    /// Owners normally come from the external account store; this is how they
    /// enter gate storage.
    pub fn register_owner(&self, owner: &UserId) -> Result<bool, GateError> {
        let created = self.storage.create_owner(owner)?;
        if created {
            tracing::info!(owner = %owner, "Registered owner");
        }
        Ok(created)
    }

    /// Lock state of (owner, peer). Side-effect free.
    ///
    /// A peer without an entry reports unlocked with no cooldown.
    pub fn status(&self, owner: &UserId, peer: &UserId) -> Result<LockStatus, GateError> {
        let record = self.load(owner)?;
        let now = self.env.now();

        Ok(record.entry(peer).map_or(
            LockStatus { locked: false, cooldown_remaining: Duration::ZERO },
            |entry| LockStatus {
                locked: entry.is_locked(),
                cooldown_remaining: entry.cooldown_remaining(now),
            },
        ))
    }

    /// Lock the conversation with `peer`. Idempotent.
    ///
    /// Outstanding grants for the peer are revoked.
    pub fn lock(&self, owner: &UserId, peer: &UserId, pin: &str) -> Result<(), GateError> {
        self.update(owner, |record| {
            self.check_pin(record, pin)?;
            record.entry_mut(peer).lock();
            Ok(())
        })
        .inspect_err(|e| self.log_rejection("lock", owner, peer, e))?;

        tracing::info!(owner = %owner, peer = %peer, "Chat locked");
        Ok(())
    }

    /// Unlock the conversation with `peer`.
    ///
    /// Clears failures and cooldown and revokes outstanding grants.
    pub fn unlock(&self, owner: &UserId, peer: &UserId, pin: &str) -> Result<(), GateError> {
        self.update(owner, |record| {
            self.check_pin(record, pin)?;
            record.entry_mut(peer).unlock();
            Ok(())
        })
        .inspect_err(|e| self.log_rejection("unlock", owner, peer, e))?;

        tracing::info!(owner = %owner, peer = %peer, "Chat unlocked");
        Ok(())
    }

    /// Verify the PIN for `peer` and issue a grant.
    ///
    /// Applies to any entry, locked or not. Failures are counted per entry;
    /// reaching `max_attempts` inside the window starts a cooldown during which
    /// every attempt, correct or not, is refused with `RateLimited`.
    pub fn verify_pin(
        &self,
        owner: &UserId,
        peer: &UserId,
        pin: &str,
    ) -> Result<IssuedGrant, GateError> {
        let now = self.env.now();

        let epoch = self
            .update(owner, |record| {
                let hash = record.pin_hash().map(str::to_owned).ok_or(GateError::NoPin)?;
                let entry = record.entry_mut(peer);

                let cooldown_remaining = entry.cooldown_remaining(now);
                if !cooldown_remaining.is_zero() {
                    return Err(GateError::RateLimited { cooldown_remaining });
                }

                entry.refresh(now, &self.config);

                if !self.hasher.verify(pin.trim(), &hash) {
                    if entry.record_failure(now, &self.config) {
                        tracing::warn!(
                            owner = %owner,
                            peer = %peer,
                            cooldown = ?self.config.cooldown,
                            "Too many failed PIN attempts, cooling down"
                        );
                    }
                    return Err(GateError::InvalidPin);
                }

                entry.reset_attempts();
                Ok(entry.grant_epoch())
            })
            .inspect_err(|e| self.log_rejection("verify", owner, peer, e))?;

        let (grant, token) = self.grants.issue(owner, peer, epoch, now);
        tracing::info!(owner = %owner, peer = %peer, expires_at = %grant.expires_at(), "Grant issued");

        Ok(IssuedGrant { grant, token })
    }

    /// Decide whether content of (owner, peer) may be revealed.
    ///
    /// No entry or an unlocked entry is allowed unconditionally. A locked entry
    /// needs a token that is authentic, scoped to exactly this pair, unexpired
    /// and issued since the last lock/unlock.
    pub fn check_access(
        &self,
        owner: &UserId,
        peer: &UserId,
        token: Option<&str>,
    ) -> Result<Access, GateError> {
        let record = self.load(owner)?;
        let Some(entry) = record.entry(peer).filter(|e| e.is_locked()) else {
            return Ok(Access::Allowed);
        };

        let Some(token) = token else {
            tracing::debug!(owner = %owner, peer = %peer, "Locked chat read without grant");
            return Ok(Access::Denied(DenyReason::Locked));
        };

        match self.grants.validate(token, owner, peer, entry.grant_epoch(), self.env.now()) {
            Ok(_) => Ok(Access::Allowed),
            Err(rejection) => {
                tracing::debug!(owner = %owner, peer = %peer, %rejection, "Grant rejected");
                Ok(Access::Denied(DenyReason::Locked))
            },
        }
    }

    /// [`check_access`](Self::check_access) as a `Result`: denial becomes
    /// `GateError::Locked`.
    pub fn require_access(
        &self,
        owner: &UserId,
        peer: &UserId,
        token: Option<&str>,
    ) -> Result<(), GateError> {
        match self.check_access(owner, peer, token)? {
            Access::Allowed => Ok(()),
            Access::Denied(DenyReason::Locked) => Err(GateError::Locked),
        }
    }

    /// Peers whose conversation is locked, in entry order.
    pub fn list_locked(&self, owner: &UserId) -> Result<Vec<UserId>, GateError> {
        Ok(self.load(owner)?.locked_peers())
    }

    /// Set (or overwrite) the owner's PIN.
    pub fn set_pin(&self, owner: &UserId, pin: &str) -> Result<(), GateError> {
        validate_pin_format(pin)?;
        let hash = self.hash_pin(pin)?;

        self.update(owner, |record| {
            record.set_pin_hash(hash);
            Ok(())
        })?;

        tracing::info!(owner = %owner, "PIN set");
        Ok(())
    }

    /// Replace the owner's PIN after checking the current one.
    pub fn change_pin(&self, owner: &UserId, old_pin: &str, new_pin: &str) -> Result<(), GateError> {
        validate_pin_format(new_pin)?;
        let hash = self.hash_pin(new_pin)?;

        self.update(owner, |record| {
            self.check_pin(record, old_pin)?;
            record.set_pin_hash(hash);
            Ok(())
        })?;

        tracing::info!(owner = %owner, "PIN changed");
        Ok(())
    }

    /// True if the owner has set a PIN.
    pub fn has_pin(&self, owner: &UserId) -> Result<bool, GateError> {
        Ok(self.load(owner)?.pin_hash().is_some())
    }

    fn load(&self, owner: &UserId) -> Result<OwnerRecord, GateError> {
        self.storage.load_owner(owner)?.ok_or(GateError::NotFound)
    }

    fn update<T>(
        &self,
        owner: &UserId,
        f: impl FnOnce(&mut OwnerRecord) -> Result<T, GateError>,
    ) -> Result<T, GateError> {
        self.storage.update_owner(owner, f)?.unwrap_or(Err(GateError::NotFound))
    }

    fn check_pin(&self, record: &OwnerRecord, pin: &str) -> Result<(), GateError> {
        let hash = record.pin_hash().ok_or(GateError::NoPin)?;
        if self.hasher.verify(pin.trim(), hash) { Ok(()) } else { Err(GateError::InvalidPin) }
    }

    fn hash_pin(&self, pin: &str) -> Result<String, GateError> {
        let mut salt = [0u8; PIN_SALT_SIZE];
        self.env.random_bytes(&mut salt);
        self.hasher.hash(pin, &salt)
    }

    fn log_rejection(&self, operation: &str, owner: &UserId, peer: &UserId, error: &GateError) {
        if error.is_internal() {
            tracing::error!(owner = %owner, peer = %peer, operation, error = %error, "Gate operation failed");
        } else {
            tracing::debug!(owner = %owner, peer = %peer, operation, error = %error, "Gate operation rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    };

    use super::*;
    use crate::{env::Timestamp, storage::MemoryStorage};

    #[derive(Clone, Default)]
    struct TestEnv {
        now_ms: Arc<AtomicU64>,
    }

    impl TestEnv {
        fn advance(&self, d: Duration) {
            self.now_ms.fetch_add(d.as_millis() as u64, Ordering::SeqCst);
        }
    }

    impl Environment for TestEnv {
        fn now(&self) -> Timestamp {
            Timestamp::from_millis(self.now_ms.load(Ordering::SeqCst))
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(0x5A);
        }
    }

    /// Plain comparison; argon2 is covered in `pin`
    #[derive(Clone)]
    struct PlainHasher;

    impl PinHasher for PlainHasher {
        fn hash(&self, pin: &str, _salt: &[u8]) -> Result<String, GateError> {
            Ok(format!("plain:{pin}"))
        }

        fn verify(&self, pin: &str, hash: &str) -> bool {
            hash.strip_prefix("plain:") == Some(pin)
        }
    }

    fn id(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn gate() -> AccessGate<TestEnv, MemoryStorage, PlainHasher> {
        let gate = AccessGate::new(
            TestEnv::default(),
            MemoryStorage::new(),
            PlainHasher,
            b"secret".to_vec(),
            GateConfig::default(),
        );
        gate.register_owner(&id("alice")).unwrap();
        gate
    }

    fn gate_with_pin() -> AccessGate<TestEnv, MemoryStorage, PlainHasher> {
        let gate = gate();
        gate.set_pin(&id("alice"), "4242").unwrap();
        gate
    }

    #[test]
    fn unknown_owner_is_not_found() {
        let gate = gate();
        let ghost = id("ghost");

        assert_eq!(gate.status(&ghost, &id("bob")), Err(GateError::NotFound));
        assert_eq!(gate.lock(&ghost, &id("bob"), "4242"), Err(GateError::NotFound));
        assert_eq!(gate.verify_pin(&ghost, &id("bob"), "4242").unwrap_err(), GateError::NotFound);
        assert_eq!(gate.check_access(&ghost, &id("bob"), None), Err(GateError::NotFound));
    }

    #[test]
    fn unknown_peer_is_unlocked() {
        let gate = gate();
        assert_eq!(
            gate.status(&id("alice"), &id("bob")).unwrap(),
            LockStatus { locked: false, cooldown_remaining: Duration::ZERO }
        );
    }

    #[test]
    fn no_pin_is_reported_everywhere() {
        let gate = gate();
        let (alice, bob) = (id("alice"), id("bob"));

        assert_eq!(gate.lock(&alice, &bob, "4242"), Err(GateError::NoPin));
        assert_eq!(gate.unlock(&alice, &bob, "4242"), Err(GateError::NoPin));
        assert_eq!(gate.verify_pin(&alice, &bob, "4242").unwrap_err(), GateError::NoPin);
        assert_eq!(gate.change_pin(&alice, "4242", "1111"), Err(GateError::NoPin));
    }

    #[test]
    fn lock_is_idempotent() {
        let gate = gate_with_pin();
        let (alice, bob) = (id("alice"), id("bob"));

        gate.lock(&alice, &bob, "4242").unwrap();
        gate.lock(&alice, &bob, "4242").unwrap();

        assert!(gate.status(&alice, &bob).unwrap().locked);
        assert_eq!(gate.list_locked(&alice).unwrap(), vec![bob]);
    }

    #[test]
    fn lock_with_wrong_pin_changes_nothing() {
        let gate = gate_with_pin();
        let (alice, bob) = (id("alice"), id("bob"));

        assert_eq!(gate.lock(&alice, &bob, "0000"), Err(GateError::InvalidPin));
        assert!(!gate.status(&alice, &bob).unwrap().locked);
    }

    #[test]
    fn pin_is_trimmed() {
        let gate = gate_with_pin();
        gate.lock(&id("alice"), &id("bob"), " 4242\n").unwrap();
    }

    #[test]
    fn locked_without_grant_is_denied() {
        let gate = gate_with_pin();
        let (alice, bob) = (id("alice"), id("bob"));
        gate.lock(&alice, &bob, "4242").unwrap();

        assert_eq!(gate.check_access(&alice, &bob, None).unwrap(), Access::Denied(DenyReason::Locked));
        assert_eq!(gate.require_access(&alice, &bob, Some("1")), Err(GateError::Locked));
        assert_eq!(gate.check_access(&alice, &id("carol"), None).unwrap(), Access::Allowed);
    }

    #[test]
    fn verify_grants_access() {
        let gate = gate_with_pin();
        let (alice, bob) = (id("alice"), id("bob"));
        gate.lock(&alice, &bob, "4242").unwrap();

        let issued = gate.verify_pin(&alice, &bob, "4242").unwrap();

        assert_eq!(issued.grant.peer(), &bob);
        assert_eq!(gate.check_access(&alice, &bob, Some(&issued.token)).unwrap(), Access::Allowed);
        assert!(gate.status(&alice, &bob).unwrap().locked, "verify does not unlock");
    }

    #[test]
    fn grant_expires_after_ttl() {
        let gate = gate_with_pin();
        let (alice, bob) = (id("alice"), id("bob"));
        gate.lock(&alice, &bob, "4242").unwrap();
        let issued = gate.verify_pin(&alice, &bob, "4242").unwrap();

        gate.env().advance(gate.config().grant_ttl - Duration::from_millis(1));
        assert_eq!(gate.check_access(&alice, &bob, Some(&issued.token)).unwrap(), Access::Allowed);

        gate.env().advance(Duration::from_millis(1));
        assert_eq!(
            gate.check_access(&alice, &bob, Some(&issued.token)).unwrap(),
            Access::Denied(DenyReason::Locked)
        );
    }

    #[test]
    fn unlock_and_relock_revoke_grants() {
        let gate = gate_with_pin();
        let (alice, bob) = (id("alice"), id("bob"));
        gate.lock(&alice, &bob, "4242").unwrap();
        let issued = gate.verify_pin(&alice, &bob, "4242").unwrap();

        gate.unlock(&alice, &bob, "4242").unwrap();
        gate.lock(&alice, &bob, "4242").unwrap();

        assert_eq!(
            gate.check_access(&alice, &bob, Some(&issued.token)).unwrap(),
            Access::Denied(DenyReason::Locked)
        );
    }

    #[test]
    fn five_failures_start_cooldown() {
        let gate = gate_with_pin();
        let (alice, bob) = (id("alice"), id("bob"));
        gate.lock(&alice, &bob, "4242").unwrap();

        for _ in 0..5 {
            assert_eq!(gate.verify_pin(&alice, &bob, "0000").unwrap_err(), GateError::InvalidPin);
        }

        assert_eq!(
            gate.verify_pin(&alice, &bob, "4242").unwrap_err(),
            GateError::RateLimited { cooldown_remaining: Duration::from_secs(15) }
        );
        assert_eq!(gate.status(&alice, &bob).unwrap().cooldown_remaining, Duration::from_secs(15));
    }

    #[test]
    fn correct_pin_after_cooldown_resets_attempts() {
        let gate = gate_with_pin();
        let (alice, bob) = (id("alice"), id("bob"));
        gate.lock(&alice, &bob, "4242").unwrap();
        for _ in 0..5 {
            let _ = gate.verify_pin(&alice, &bob, "0000");
        }

        gate.env().advance(Duration::from_secs(15));
        gate.verify_pin(&alice, &bob, "4242").unwrap();

        let record = gate.storage().load_owner(&alice).unwrap().unwrap();
        assert!(record.entry(&bob).unwrap().failed_attempts().is_empty());
    }

    #[test]
    fn failure_after_cooldown_reenters_cooldown() {
        let gate = gate_with_pin();
        let (alice, bob) = (id("alice"), id("bob"));
        for _ in 0..5 {
            let _ = gate.verify_pin(&alice, &bob, "0000");
        }

        gate.env().advance(Duration::from_secs(15));
        assert_eq!(gate.verify_pin(&alice, &bob, "0000").unwrap_err(), GateError::InvalidPin);
        assert!(matches!(
            gate.verify_pin(&alice, &bob, "4242").unwrap_err(),
            GateError::RateLimited { .. }
        ));
    }

    #[test]
    fn failures_outside_window_are_forgotten() {
        let gate = gate_with_pin();
        let (alice, bob) = (id("alice"), id("bob"));
        for _ in 0..4 {
            let _ = gate.verify_pin(&alice, &bob, "0000");
        }

        gate.env().advance(gate.config().attempt_window);
        assert_eq!(gate.verify_pin(&alice, &bob, "0000").unwrap_err(), GateError::InvalidPin);
        gate.verify_pin(&alice, &bob, "4242").unwrap();
    }

    #[test]
    fn unlock_clears_cooldown() {
        let gate = gate_with_pin();
        let (alice, bob) = (id("alice"), id("bob"));
        gate.lock(&alice, &bob, "4242").unwrap();
        for _ in 0..5 {
            let _ = gate.verify_pin(&alice, &bob, "0000");
        }

        gate.unlock(&alice, &bob, "4242").unwrap();

        assert_eq!(
            gate.status(&alice, &bob).unwrap(),
            LockStatus { locked: false, cooldown_remaining: Duration::ZERO }
        );
    }

    #[test]
    fn set_pin_validates_format() {
        let gate = gate();
        assert!(matches!(gate.set_pin(&id("alice"), "12"), Err(GateError::Validation(_))));
        assert!(!gate.has_pin(&id("alice")).unwrap());

        gate.set_pin(&id("alice"), "123456").unwrap();
        assert!(gate.has_pin(&id("alice")).unwrap());
    }

    #[test]
    fn change_pin_requires_old_pin() {
        let gate = gate_with_pin();
        let (alice, bob) = (id("alice"), id("bob"));

        assert_eq!(gate.change_pin(&alice, "0000", "1111"), Err(GateError::InvalidPin));
        gate.change_pin(&alice, "4242", "1111").unwrap();

        assert_eq!(gate.lock(&alice, &bob, "4242"), Err(GateError::InvalidPin));
        gate.lock(&alice, &bob, "1111").unwrap();
    }
}
