//! Grants: short-lived proof that the owner recently entered the PIN for one
//! peer.
//!
//! A grant is a self-contained signed token; the server keeps no grant table.
//! Revocation works through the entry's grant epoch: lock and unlock bump it,
//! and a grant is only honoured while its epoch matches the entry's.
//!
//! # Token Format
//!
//! base64url (no padding) of:
//!
//! ```text
//! owner_len: u16 BE | owner | peer_len: u16 BE | peer | expires_at_ms: u64 BE
//!   | epoch: u32 BE | HMAC-SHA256 tag (32 bytes)
//! ```
//!
//! The tag covers every byte before it.

use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chatlock_crypto::{GRANT_TAG_SIZE, sign_grant, verify_grant};
use zeroize::Zeroizing;

use crate::{
    env::Timestamp,
    id::{MAX_USER_ID_LEN, UserId},
};

/// Upper bound on an encoded token
const MAX_TOKEN_LEN: usize = 2048;

/// Claim bytes plus tag for two ids of maximum length
const MAX_SIGNED_LEN: usize = 2 * (2 + MAX_USER_ID_LEN) + 8 + 4 + GRANT_TAG_SIZE;

// Every issued token must decode: ids fit the u16 prefix and the longest
// token (4 base64 chars per 3 bytes) stays under the decode limit.
const _: () = assert!(MAX_USER_ID_LEN <= u16::MAX as usize);
const _: () = assert!(MAX_SIGNED_LEN.div_ceil(3) * 4 <= MAX_TOKEN_LEN);

/// A verified (or freshly issued) grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    owner: UserId,
    peer: UserId,
    expires_at: Timestamp,
    epoch: u32,
}

impl Grant {
    /// Owner who entered the PIN.
    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    /// Peer whose conversation the grant opens.
    pub fn peer(&self) -> &UserId {
        &self.peer
    }

    /// Instant after which the grant is no longer honoured.
    pub fn expires_at(&self) -> Timestamp {
        self.expires_at
    }

    /// Entry epoch at issuance.
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    fn claims(&self) -> Vec<u8> {
        let owner = self.owner.as_str().as_bytes();
        let peer = self.peer.as_str().as_bytes();

        let mut out = Vec::with_capacity(2 + owner.len() + 2 + peer.len() + 8 + 4);
        push_id(&mut out, owner);
        push_id(&mut out, peer);
        out.extend_from_slice(&self.expires_at.as_millis().to_be_bytes());
        out.extend_from_slice(&self.epoch.to_be_bytes());
        out
    }
}

/// Append `id` with its u16 BE length prefix.
fn push_id(out: &mut Vec<u8>, id: &[u8]) {
    // invariant: UserId length is capped at MAX_USER_ID_LEN, checked above to fit u16
    let len = u16::try_from(id.len()).unwrap_or(u16::MAX);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(id);
}

/// Why a presented token was not honoured.
///
/// Only used for logging; callers collapse every rejection into `Locked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantRejection {
    /// Not base64url, truncated, or structurally invalid
    Malformed,
    /// Tag does not match the claims
    BadSignature,
    /// Issued for a different owner or peer
    WrongScope,
    /// TTL elapsed
    Expired,
    /// Entry was locked or unlocked after issuance
    Revoked,
}

impl std::fmt::Display for GrantRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::Malformed => "malformed",
            Self::BadSignature => "bad signature",
            Self::WrongScope => "wrong scope",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        };
        f.write_str(reason)
    }
}

/// Issues and checks grant tokens under a server secret.
#[derive(Clone)]
pub struct GrantStore {
    secret: Zeroizing<Vec<u8>>,
    ttl: Duration,
}

impl GrantStore {
    /// Store signing with `secret`, issuing grants valid for `ttl`.
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self { secret: Zeroizing::new(secret.into()), ttl }
    }

    /// Grant lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a grant for (owner, peer) at entry epoch `epoch`.
    ///
    /// Returns the grant and its encoded token.
    pub fn issue(&self, owner: &UserId, peer: &UserId, epoch: u32, now: Timestamp) -> (Grant, String) {
        let grant = Grant {
            owner: owner.clone(),
            peer: peer.clone(),
            expires_at: now.saturating_add(self.ttl),
            epoch,
        };

        let mut bytes = grant.claims();
        let tag = sign_grant(&self.secret, &bytes);
        bytes.extend_from_slice(&tag);

        (grant, URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Decode `token` and check its signature. Scope, expiry and epoch are not
    /// checked.
    pub fn decode(&self, token: &str) -> Result<Grant, GrantRejection> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(GrantRejection::Malformed);
        }
        let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|_| GrantRejection::Malformed)?;

        let Some(split) = bytes.len().checked_sub(GRANT_TAG_SIZE) else {
            return Err(GrantRejection::Malformed);
        };
        let (claims, tag) = bytes.split_at(split);

        if !verify_grant(&self.secret, claims, tag) {
            return Err(GrantRejection::BadSignature);
        }

        parse_claims(claims).ok_or(GrantRejection::Malformed)
    }

    /// Full check of `token` for (owner, peer) against the entry's current
    /// epoch.
    pub fn validate(
        &self,
        token: &str,
        owner: &UserId,
        peer: &UserId,
        epoch: u32,
        now: Timestamp,
    ) -> Result<Grant, GrantRejection> {
        let grant = self.decode(token)?;

        if grant.owner != *owner || grant.peer != *peer {
            return Err(GrantRejection::WrongScope);
        }
        if now >= grant.expires_at {
            return Err(GrantRejection::Expired);
        }
        if grant.epoch != epoch {
            return Err(GrantRejection::Revoked);
        }

        Ok(grant)
    }
}

impl std::fmt::Debug for GrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantStore").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

/// Cursor over signed claim bytes.
struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.bytes.len() < n {
            return None;
        }
        let (head, rest) = self.bytes.split_at(n);
        self.bytes = rest;
        Some(head)
    }

    fn array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.take(N).and_then(|b| b.try_into().ok())
    }

    fn id(&mut self) -> Option<UserId> {
        let len = u16::from_be_bytes(self.array()?) as usize;
        let raw = std::str::from_utf8(self.take(len)?).ok()?;
        UserId::new(raw).ok()
    }
}

fn parse_claims(claims: &[u8]) -> Option<Grant> {
    let mut reader = Reader { bytes: claims };

    let owner = reader.id()?;
    let peer = reader.id()?;
    let expires_at = Timestamp::from_millis(u64::from_be_bytes(reader.array()?));
    let epoch = u32::from_be_bytes(reader.array()?);

    if !reader.bytes.is_empty() {
        return None;
    }

    Some(Grant { owner, peer, expires_at, epoch })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(900);

    fn id(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn store() -> GrantStore {
        GrantStore::new(b"grant-secret".to_vec(), TTL)
    }

    fn at(millis: u64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    #[test]
    fn issued_token_validates() {
        let store = store();
        let (grant, token) = store.issue(&id("alice"), &id("bob"), 3, at(1_000));

        let checked = store.validate(&token, &id("alice"), &id("bob"), 3, at(1_000)).unwrap();

        assert_eq!(checked, grant);
        assert_eq!(grant.expires_at(), at(901_000));
    }

    #[test]
    fn token_is_url_safe() {
        let (_, token) = store().issue(&id("alice"), &id("bob"), 0, at(0));
        assert!(token.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
    }

    #[test]
    fn expires_exactly_at_ttl() {
        let store = store();
        let (_, token) = store.issue(&id("alice"), &id("bob"), 0, at(0));

        assert!(store.validate(&token, &id("alice"), &id("bob"), 0, at(899_999)).is_ok());
        assert_eq!(
            store.validate(&token, &id("alice"), &id("bob"), 0, at(900_000)),
            Err(GrantRejection::Expired)
        );
    }

    #[test]
    fn other_peer_or_owner_is_wrong_scope() {
        let store = store();
        let (_, token) = store.issue(&id("alice"), &id("bob"), 0, at(0));

        assert_eq!(
            store.validate(&token, &id("alice"), &id("carol"), 0, at(1)),
            Err(GrantRejection::WrongScope)
        );
        assert_eq!(
            store.validate(&token, &id("mallory"), &id("bob"), 0, at(1)),
            Err(GrantRejection::WrongScope)
        );
    }

    #[test]
    fn stale_epoch_is_revoked() {
        let store = store();
        let (_, token) = store.issue(&id("alice"), &id("bob"), 4, at(0));

        assert_eq!(
            store.validate(&token, &id("alice"), &id("bob"), 5, at(1)),
            Err(GrantRejection::Revoked)
        );
    }

    #[test]
    fn other_secret_is_bad_signature() {
        let (_, token) = store().issue(&id("alice"), &id("bob"), 0, at(0));
        let other = GrantStore::new(b"other-secret".to_vec(), TTL);

        assert_eq!(other.decode(&token), Err(GrantRejection::BadSignature));
    }

    #[test]
    fn bare_one_is_not_a_token() {
        assert_eq!(store().decode("1"), Err(GrantRejection::Malformed));
    }

    #[test]
    fn longest_ids_still_validate() {
        let store = store();
        let owner = id(&"o".repeat(MAX_USER_ID_LEN));
        let peer = id(&"p".repeat(MAX_USER_ID_LEN));
        let (grant, token) = store.issue(&owner, &peer, u32::MAX, at(0));

        assert!(token.len() <= MAX_TOKEN_LEN);
        assert_eq!(store.validate(&token, &owner, &peer, u32::MAX, at(1)), Ok(grant));
    }

    #[test]
    fn garbage_is_malformed() {
        let store = store();
        assert_eq!(store.decode(""), Err(GrantRejection::Malformed));
        assert_eq!(store.decode("not base64!"), Err(GrantRejection::Malformed));
        assert_eq!(store.decode(&"A".repeat(MAX_TOKEN_LEN + 1)), Err(GrantRejection::Malformed));
    }

    #[test]
    fn debug_hides_secret() {
        let rendered = format!("{:?}", store());
        assert!(!rendered.contains("grant-secret"));
    }
}
