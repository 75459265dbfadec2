//! Sealed media objects and their wire metadata.
//!
//! An attachment is stored as an [`EncryptedObject`] next to its message. On
//! read, the server recomputes the object's key and ships it to the client
//! inline as [`MediaMetadata`] (base64 fields), while the blob itself is
//! downloaded separately as `ciphertext || tag`.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::{
    cipher::{self, IV_SIZE, KEY_SIZE, TAG_SIZE},
    derivation::{MediaContext, MediaKey, SALT_SIZE, derive_media_key},
    error::CryptoError,
};

/// Algorithm name advertised in wire metadata
pub const MEDIA_ALGORITHM: &str = "AES-GCM";

/// An encrypted attachment.
///
/// Immutable once created. `ciphertext.len()` equals the plaintext length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedObject {
    /// AES-256-GCM ciphertext without the tag
    pub ciphertext: Vec<u8>,
    /// 96-bit iv
    pub iv: [u8; IV_SIZE],
    /// Per-object HKDF salt
    pub salt: [u8; SALT_SIZE],
    /// 128-bit GCM tag
    pub auth_tag: [u8; TAG_SIZE],
    /// MIME type of the plaintext
    pub mime_type: String,
}

impl EncryptedObject {
    /// Download wire format: `ciphertext || tag`.
    pub fn combined(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.ciphertext.len() + TAG_SIZE);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.auth_tag);
        out
    }
}

/// Split a downloaded `ciphertext || tag` blob.
///
/// # Errors
///
/// - `AuthenticationFailure`: blob is shorter than a tag. Reported the same
///   way as a bad tag so truncation is not distinguishable from tampering.
pub fn split_combined(combined: &[u8]) -> Result<(&[u8], [u8; TAG_SIZE]), CryptoError> {
    let Some(split) = combined.len().checked_sub(TAG_SIZE) else {
        return Err(CryptoError::AuthenticationFailure);
    };

    let (ciphertext, tag_bytes) = combined.split_at(split);
    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(tag_bytes);

    Ok((ciphertext, tag))
}

/// Encrypt an attachment under a freshly derived key.
///
/// `salt` and `iv` must come from a CSPRNG in production; they are parameters
/// so tests stay deterministic.
pub fn seal_media(
    master_key: &[u8],
    context: &MediaContext,
    plaintext: &[u8],
    mime_type: &str,
    salt: [u8; SALT_SIZE],
    iv: [u8; IV_SIZE],
) -> EncryptedObject {
    let key = derive_media_key(master_key, context, &salt);
    let (ciphertext, auth_tag) = cipher::encrypt(plaintext, key.bytes(), &iv);

    EncryptedObject { ciphertext, iv, salt, auth_tag, mime_type: mime_type.to_string() }
}

/// Decrypt an attachment, recomputing its key from `master_key`.
///
/// # Errors
///
/// - `AuthenticationFailure`: wrong master key, wrong context, or tampered
///   object
pub fn open_media(
    master_key: &[u8],
    context: &MediaContext,
    object: &EncryptedObject,
) -> Result<Vec<u8>, CryptoError> {
    let key = derive_media_key(master_key, context, &object.salt);
    cipher::decrypt(&object.ciphertext, key.bytes(), &object.iv, &object.auth_tag)
}

/// Encryption metadata delivered inline with a message record.
///
/// Binary fields are standard base64. Fields default to empty so a record with
/// a missing field still parses and is rejected by the `decode_*` accessors
/// instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    /// Algorithm name, always [`MEDIA_ALGORITHM`]
    #[serde(default)]
    pub algo: String,
    /// Derived AES-256 key
    #[serde(default)]
    pub key: String,
    /// 96-bit iv
    #[serde(default)]
    pub iv: String,
    /// 128-bit GCM tag
    #[serde(default)]
    pub auth_tag: String,
    /// MIME type of the plaintext
    #[serde(default)]
    pub mime_type: String,
    /// Path of the `ciphertext || tag` blob
    #[serde(default)]
    pub download_url: String,
}

impl MediaMetadata {
    /// Describe `object` for a client that is allowed to read it.
    pub fn new(key: &MediaKey, object: &EncryptedObject, download_url: impl Into<String>) -> Self {
        Self {
            algo: MEDIA_ALGORITHM.to_string(),
            key: STANDARD.encode(key.bytes()),
            iv: STANDARD.encode(object.iv),
            auth_tag: STANDARD.encode(object.auth_tag),
            mime_type: object.mime_type.clone(),
            download_url: download_url.into(),
        }
    }

    /// Check that every field a decryptor needs is present.
    ///
    /// # Errors
    ///
    /// - `MalformedMetadata`: names the first empty field
    pub fn ensure_complete(&self) -> Result<(), CryptoError> {
        let fields = [
            ("key", &self.key),
            ("iv", &self.iv),
            ("authTag", &self.auth_tag),
            ("mimeType", &self.mime_type),
        ];

        match fields.iter().find(|(_, value)| value.is_empty()) {
            Some((name, _)) => Err(CryptoError::MalformedMetadata(name)),
            None => Ok(()),
        }
    }

    /// Decode the key field.
    pub fn decode_key(&self) -> Result<MediaKey, CryptoError> {
        decode_fixed::<KEY_SIZE>("key", &self.key).map(MediaKey::from_bytes)
    }

    /// Decode the iv field.
    pub fn decode_iv(&self) -> Result<[u8; IV_SIZE], CryptoError> {
        decode_fixed::<IV_SIZE>("iv", &self.iv)
    }

    /// Decode the tag field.
    pub fn decode_auth_tag(&self) -> Result<[u8; TAG_SIZE], CryptoError> {
        decode_fixed::<TAG_SIZE>("authTag", &self.auth_tag)
    }
}

fn decode_fixed<const N: usize>(field: &'static str, value: &str) -> Result<[u8; N], CryptoError> {
    if value.is_empty() {
        return Err(CryptoError::MalformedMetadata(field));
    }

    let bytes = STANDARD.decode(value).map_err(|_| CryptoError::MalformedMetadata(field))?;

    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| CryptoError::InvalidSize {
        field,
        expected: N,
        actual: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &[u8] = b"server_master_key_material_32by!";
    const SALT: [u8; SALT_SIZE] = [0x11; SALT_SIZE];
    const IV: [u8; IV_SIZE] = [0x22; IV_SIZE];

    fn sealed() -> (MediaContext, EncryptedObject) {
        let context = MediaContext::new("msg-1", "image");
        let object = seal_media(MASTER, &context, b"image bytes", "image/png", SALT, IV);
        (context, object)
    }

    #[test]
    fn seal_open_roundtrip() {
        let (context, object) = sealed();
        assert_eq!(open_media(MASTER, &context, &object).unwrap(), b"image bytes");
        assert_eq!(object.mime_type, "image/png");
    }

    #[test]
    fn open_with_other_context_fails() {
        let (_, object) = sealed();
        let other = MediaContext::new("msg-2", "image");

        assert_eq!(open_media(MASTER, &other, &object), Err(CryptoError::AuthenticationFailure));
    }

    #[test]
    fn open_with_other_master_key_fails() {
        let (context, object) = sealed();

        assert_eq!(
            open_media(b"another_master_key_material_32b!", &context, &object),
            Err(CryptoError::AuthenticationFailure)
        );
    }

    #[test]
    fn combined_is_ciphertext_then_tag() {
        let (_, object) = sealed();
        let combined = object.combined();

        assert_eq!(combined.len(), object.ciphertext.len() + TAG_SIZE);

        let (ciphertext, tag) = split_combined(&combined).unwrap();
        assert_eq!(ciphertext, object.ciphertext.as_slice());
        assert_eq!(tag, object.auth_tag);
    }

    #[test]
    fn split_rejects_short_blob() {
        assert_eq!(split_combined(&[0u8; TAG_SIZE - 1]), Err(CryptoError::AuthenticationFailure));
    }

    #[test]
    fn metadata_decodes_to_original_material() {
        let (context, object) = sealed();
        let key = derive_media_key(MASTER, &context, &object.salt);
        let metadata = MediaMetadata::new(&key, &object, "/messages/image/msg-1");

        assert_eq!(metadata.algo, MEDIA_ALGORITHM);
        assert_eq!(metadata.decode_key().unwrap().bytes(), key.bytes());
        assert_eq!(metadata.decode_iv().unwrap(), object.iv);
        assert_eq!(metadata.decode_auth_tag().unwrap(), object.auth_tag);
        metadata.ensure_complete().unwrap();
    }

    #[test]
    fn metadata_serializes_camel_case() {
        let (context, object) = sealed();
        let key = derive_media_key(MASTER, &context, &object.salt);
        let json = serde_json::to_value(MediaMetadata::new(&key, &object, "/x")).unwrap();

        assert!(json.get("authTag").is_some());
        assert!(json.get("mimeType").is_some());
        assert!(json.get("downloadUrl").is_some());
    }

    #[test]
    fn missing_field_is_reported() {
        let metadata: MediaMetadata =
            serde_json::from_str(r#"{"key":"AAAA","iv":"AAAA","mimeType":"image/png"}"#).unwrap();

        assert_eq!(metadata.ensure_complete(), Err(CryptoError::MalformedMetadata("authTag")));
    }

    #[test]
    fn wrong_sized_key_is_rejected() {
        let metadata = MediaMetadata { key: STANDARD.encode([0u8; 16]), ..Default::default() };

        assert_eq!(
            metadata.decode_key().unwrap_err(),
            CryptoError::InvalidSize { field: "key", expected: KEY_SIZE, actual: 16 }
        );
    }

    #[test]
    fn bad_base64_is_rejected() {
        let metadata = MediaMetadata { iv: "***".to_string(), ..Default::default() };
        assert_eq!(metadata.decode_iv(), Err(CryptoError::MalformedMetadata("iv")));
    }
}
