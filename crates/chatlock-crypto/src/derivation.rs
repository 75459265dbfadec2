//! Per-object key derivation using HKDF-SHA256

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::{cipher::KEY_SIZE, error::CryptoError};

/// Size of the per-object salt generated at upload time
pub const SALT_SIZE: usize = 16;

/// Domain label prefixed to every media context
const MEDIA_CONTEXT_LABEL: &[u8] = b"chatlock-media-v1";

/// Largest output HKDF-SHA256 can produce (255 blocks of 32 bytes)
const MAX_OUTPUT_LEN: usize = 255 * 32;

/// Derive `length` bytes of key material.
///
/// HKDF-SHA256 with `salt` as the HKDF salt and `context` as the info
/// parameter. Inputs are raw bytes; any string encoding (UTF-8 text, decoded
/// base64) must be resolved by the caller before calling this.
///
/// # Errors
///
/// - `InvalidLength`: `length` is zero or exceeds `255 * 32`
///
/// # Security
///
/// - Deterministic: same inputs always produce the same output, so keys are
///   recomputed instead of stored
/// - Changing any of master key, context or salt changes the output
pub fn derive_key(
    master_key: &[u8],
    context: &[u8],
    salt: &[u8],
    length: usize,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if length == 0 || length > MAX_OUTPUT_LEN {
        return Err(CryptoError::InvalidLength { requested: length });
    }

    let hkdf = Hkdf::<Sha256>::new(Some(salt), master_key);
    let mut okm = Zeroizing::new(vec![0u8; length]);
    hkdf.expand(context, &mut okm)
        .map_err(|_| CryptoError::InvalidLength { requested: length })?;

    Ok(okm)
}

/// Derive the 32-byte AES-256 key for one media object.
pub fn derive_media_key(master_key: &[u8], context: &MediaContext, salt: &[u8]) -> MediaKey {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), master_key);

    let mut key = [0u8; KEY_SIZE];
    let Ok(()) = hkdf.expand(context.as_bytes(), &mut key) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    MediaKey { key }
}

/// Canonical HKDF info for a media object.
///
/// Binds a derived key to exactly one (message, field) pair.
///
/// Layout: `label || len(message_id) || message_id || len(field) || field`,
/// lengths as 4-byte big-endian. Length prefixes keep `("ab", "c")` and
/// `("a", "bc")` distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaContext {
    bytes: Vec<u8>,
}

impl MediaContext {
    /// Build the context for `field` of message `message_id`.
    pub fn new(message_id: &str, field: &str) -> Self {
        let mut bytes =
            Vec::with_capacity(MEDIA_CONTEXT_LABEL.len() + 8 + message_id.len() + field.len());
        bytes.extend_from_slice(MEDIA_CONTEXT_LABEL);
        bytes.extend_from_slice(&(message_id.len() as u32).to_be_bytes());
        bytes.extend_from_slice(message_id.as_bytes());
        bytes.extend_from_slice(&(field.len() as u32).to_be_bytes());
        bytes.extend_from_slice(field.as_bytes());
        Self { bytes }
    }

    /// Encoded context bytes (HKDF info).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A derived AES-256 key for a single media object.
///
/// Zeroized on drop.
#[derive(Clone)]
pub struct MediaKey {
    key: [u8; KEY_SIZE],
}

impl MediaKey {
    /// Wrap raw key bytes (e.g. a key decoded from wire metadata).
    pub fn from_bytes(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    /// 32-byte AES-256 key.
    pub fn bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

impl Drop for MediaKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for MediaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MediaKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &[u8] = b"server_master_key_material_32by!";

    #[test]
    fn derive_is_deterministic() {
        let a = derive_key(MASTER, b"ctx", b"salt", 32).unwrap();
        let b = derive_key(MASTER, b"ctx", b"salt", 32).unwrap();
        assert_eq!(*a, *b, "same inputs must produce same output");
    }

    #[test]
    fn different_salts_produce_different_keys() {
        let a = derive_key(MASTER, b"ctx", b"salt-a", 32).unwrap();
        let b = derive_key(MASTER, b"ctx", b"salt-b", 32).unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn different_contexts_produce_different_keys() {
        let a = derive_key(MASTER, b"msg-1|image", b"salt", 32).unwrap();
        let b = derive_key(MASTER, b"msg-2|image", b"salt", 32).unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn output_has_requested_length() {
        for length in [1, 16, 32, 64, MAX_OUTPUT_LEN] {
            let okm = derive_key(MASTER, b"ctx", b"salt", length).unwrap();
            assert_eq!(okm.len(), length);
        }
    }

    #[test]
    fn rejects_zero_and_oversized_lengths() {
        assert_eq!(
            derive_key(MASTER, b"ctx", b"salt", 0).unwrap_err(),
            CryptoError::InvalidLength { requested: 0 }
        );
        assert_eq!(
            derive_key(MASTER, b"ctx", b"salt", MAX_OUTPUT_LEN + 1).unwrap_err(),
            CryptoError::InvalidLength { requested: MAX_OUTPUT_LEN + 1 }
        );
    }

    #[test]
    fn shorter_output_is_prefix_of_longer() {
        // HKDF-Expand property: no hidden padding or re-keying by length
        let short = derive_key(MASTER, b"ctx", b"salt", 16).unwrap();
        let long = derive_key(MASTER, b"ctx", b"salt", 32).unwrap();
        assert_eq!(&short[..], &long[..16]);
    }

    #[test]
    fn media_key_matches_generic_derivation() {
        let context = MediaContext::new("msg-42", "image");
        let media_key = derive_media_key(MASTER, &context, b"0123456789abcdef");
        let generic = derive_key(MASTER, context.as_bytes(), b"0123456789abcdef", 32).unwrap();
        assert_eq!(&media_key.bytes()[..], &generic[..]);
    }

    #[test]
    fn context_is_length_prefixed() {
        let a = MediaContext::new("ab", "c");
        let b = MediaContext::new("a", "bc");
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn works_with_empty_inputs() {
        let okm = derive_key(&[], &[], &[], 32).unwrap();
        assert_eq!(okm.len(), 32);
    }

    #[test]
    fn rfc5869_test_case_1() {
        let ikm = [0x0b; 22];
        let salt: Vec<u8> = (0x00..=0x0c).collect();
        let info: Vec<u8> = (0xf0..=0xf9).collect();

        let okm = derive_key(&ikm, &info, &salt, 42).unwrap();

        assert_eq!(
            hex::encode(&okm[..]),
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865"
        );
    }

    #[test]
    fn debug_does_not_leak_key() {
        let key = MediaKey::from_bytes([0xAA; KEY_SIZE]);
        assert_eq!(format!("{key:?}"), "MediaKey(..)");
    }
}
