//! Media encryption using AES-256-GCM
//!
//! All functions are pure - ivs must be provided by the caller. The tag is
//! detached so ciphertext length always equals plaintext length.

use aes_gcm::{
    Aes256Gcm, Nonce, Tag,
    aead::{AeadInPlace, KeyInit},
};

use crate::error::CryptoError;

/// AES-256 key size (32 bytes)
pub const KEY_SIZE: usize = 32;

/// GCM iv size (96 bits)
pub const IV_SIZE: usize = 12;

/// GCM tag size (128 bits)
pub const TAG_SIZE: usize = 16;

/// Encrypt `plaintext` with AES-256-GCM.
///
/// Returns `(ciphertext, auth_tag)`. No associated data.
///
/// # Security
///
/// - `iv` must never be reused with the same key. The media pipeline
///   guarantees this structurally by deriving a fresh key per object
/// - Caller MUST provide a cryptographically random iv in production
pub fn encrypt(
    plaintext: &[u8],
    key: &[u8; KEY_SIZE],
    iv: &[u8; IV_SIZE],
) -> (Vec<u8>, [u8; TAG_SIZE]) {
    let cipher = Aes256Gcm::new(key.into());
    let mut buffer = plaintext.to_vec();

    let Ok(tag) = cipher.encrypt_in_place_detached(Nonce::from_slice(iv), b"", &mut buffer) else {
        unreachable!("AES-256-GCM encryption cannot fail for payloads under 64 GiB");
    };

    let mut auth_tag = [0u8; TAG_SIZE];
    auth_tag.copy_from_slice(&tag);

    (buffer, auth_tag)
}

/// Decrypt `ciphertext` with AES-256-GCM.
///
/// The tag is verified before any plaintext is returned. On mismatch the
/// decrypted buffer is discarded.
///
/// # Errors
///
/// - `AuthenticationFailure`: wrong key, wrong iv, or tampered
///   ciphertext/tag. The cases are not distinguished.
pub fn decrypt(
    ciphertext: &[u8],
    key: &[u8; KEY_SIZE],
    iv: &[u8; IV_SIZE],
    auth_tag: &[u8; TAG_SIZE],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(key.into());
    let mut buffer = ciphertext.to_vec();

    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(iv),
            b"",
            &mut buffer,
            Tag::from_slice(auth_tag),
        )
        .map_err(|_| CryptoError::AuthenticationFailure)?;

    Ok(buffer)
}
