//! Chat-Lock Cryptographic Primitives
//!
//! Cryptographic building blocks for the media pipeline and the access gate.
//! Pure functions with deterministic outputs. Callers provide random bytes
//! (salts, ivs) for deterministic testing.
//!
//! # Key Lifecycle
//!
//! Attachment keys are never stored. Each object carries a fresh random salt,
//! and its key is recomputed on demand from the server master key, that salt,
//! and a context string naming the object.
//!
//! ```text
//! Server Master Key
//!        │
//!        ▼
//! HKDF(salt = per-object salt, info = MediaContext) → Media Key
//!        │
//!        ▼
//! AES-256-GCM(iv = per-object iv) → ciphertext ‖ tag
//! ```
//!
//! # Security
//!
//! Key Uniqueness:
//! - Every object gets a fresh 16-byte salt, so no key is ever reused with a
//!   second iv
//! - The context binds the key to one (message, field) pair, so two objects
//!   never share a key even if salts collide
//!
//! Authenticity:
//! - AES-256-GCM with a 128-bit tag; the tag is verified before any plaintext
//!   is released
//! - Decryption failures collapse into a single opaque
//!   [`CryptoError::AuthenticationFailure`]
//!
//! Grants:
//! - Grant tokens are authenticated with HMAC-SHA256 under a server secret and
//!   compared in constant time

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cipher;
pub mod derivation;
mod error;
pub mod mac;
pub mod media;

pub use cipher::{IV_SIZE, KEY_SIZE, TAG_SIZE, decrypt, encrypt};
pub use derivation::{MediaContext, MediaKey, SALT_SIZE, derive_key, derive_media_key};
pub use error::CryptoError;
pub use mac::{GRANT_TAG_SIZE, sign_grant, verify_grant};
pub use media::{
    EncryptedObject, MEDIA_ALGORITHM, MediaMetadata, open_media, seal_media, split_combined,
};
