//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors from key derivation and media encryption.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Tag verification failed.
    ///
    /// Covers wrong key, wrong iv, tampered ciphertext and tampered tag alike.
    /// The variants are deliberately indistinguishable so decryption cannot be
    /// used as an oracle.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// Requested HKDF output length is outside `1..=255 * 32`.
    #[error("invalid key length: {requested} bytes")]
    InvalidLength {
        /// Length the caller asked for
        requested: usize,
    },

    /// A fixed-size field (key, iv, tag) had the wrong number of bytes.
    #[error("invalid {field} size: expected {expected} bytes, got {actual}")]
    InvalidSize {
        /// Which field was malformed
        field: &'static str,
        /// Required size
        expected: usize,
        /// Size that was provided
        actual: usize,
    },

    /// Wire metadata could not be decoded (missing field or bad base64).
    #[error("malformed metadata: {0}")]
    MalformedMetadata(&'static str),
}
