//! Chat-Lock access gate.
//!
//! Decides, per (owner, peer) conversation, whether content may be revealed.
//! Owners lock a conversation behind their PIN; reading a locked conversation
//! requires a short-lived grant obtained by re-entering the PIN. Guessing is
//! throttled per conversation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ AccessGate                                   │
//! │  status / lock / unlock / verify_pin / ...   │
//! └──────┬──────────────┬───────────────┬────────┘
//!        │              │               │
//!  ┌─────▼─────┐  ┌─────▼─────┐  ┌──────▼──────┐
//!  │ Storage   │  │ PinHasher │  │ GrantStore  │
//!  │ (records) │  │ (argon2)  │  │ (HMAC)      │
//!  └───────────┘  └───────────┘  └─────────────┘
//! ```
//!
//! Time and randomness come from an [`Environment`] so throttling and grant
//! expiry run under simulated time in tests.
//!
//! # Invariants
//!
//! - At most one [`LockEntry`] per (owner, peer); entries are never deleted
//! - Attempt accounting for an owner is atomic (one storage update per call)
//! - A locked conversation is never revealed without a grant that is
//!   authentic, correctly scoped, unexpired and issued since the last
//!   lock/unlock

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod attempts;
pub mod cache;
pub mod config;
pub mod entry;
pub mod env;
pub mod error;
pub mod gate;
pub mod grant;
pub mod id;
pub mod pin;
pub mod record;
pub mod storage;

pub use attempts::AttemptWindow;
pub use cache::BoundedCache;
pub use config::GateConfig;
pub use entry::{LockEntry, LockState};
pub use env::{Environment, Timestamp};
pub use error::GateError;
pub use gate::{Access, AccessGate, DenyReason, IssuedGrant, LockStatus};
pub use grant::{Grant, GrantRejection, GrantStore};
pub use id::{HasId, MAX_USER_ID_LEN, Reference, UserId};
pub use pin::{Argon2PinHasher, PinHasher, validate_pin_format};
pub use record::OwnerRecord;
pub use storage::{ChaoticStorage, MemoryStorage, Storage, StorageError};
