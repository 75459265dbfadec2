//! Server error types.
//!
//! Failures of the binary itself, outside a single API request:
//! - Configuration (missing or malformed secrets)
//! - Storage (database cannot be opened)
//! - Gate and crypto failures surfaced by CLI subcommands
//! - File I/O for `seal` and `open`

use std::fmt;

use chatlock_core::{GateError, StorageError};
use chatlock_crypto::CryptoError;

/// Errors that can occur while starting or driving the server.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration is missing or invalid.
    ///
    /// Fatal at startup. The message names the offending setting but never
    /// its value.
    Config(String),

    /// Storage backend failed.
    ///
    /// Usually the database file cannot be opened or is held by another
    /// process.
    Storage(StorageError),

    /// Gate operation refused or failed.
    ///
    /// Returned by CLI subcommands; the API maps these to HTTP statuses
    /// instead.
    Gate(GateError),

    /// Sealing or opening an attachment failed.
    Crypto(CryptoError),

    /// Reading or writing a file failed.
    Io(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::Gate(err) => write!(f, "gate error: {err}"),
            Self::Crypto(err) => write!(f, "crypto error: {err}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Gate(err) => Some(err),
            Self::Crypto(err) => Some(err),
            Self::Config(_) | Self::Io(_) => None,
        }
    }
}

impl From<StorageError> for ServerError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<GateError> for ServerError {
    fn from(err: GateError) -> Self {
        Self::Gate(err)
    }
}

impl From<CryptoError> for ServerError {
    fn from(err: CryptoError) -> Self {
        Self::Crypto(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_display() {
        let err = ServerError::Config("CHATLOCK_MEDIA_KEY is not set".to_string());
        assert_eq!(err.to_string(), "configuration error: CHATLOCK_MEDIA_KEY is not set");

        let err = ServerError::from(GateError::NoPin);
        assert_eq!(err.to_string(), "gate error: no PIN set");

        let err = ServerError::from(StorageError::Io("locked".to_string()));
        assert_eq!(err.to_string(), "storage error: I/O error: locked");
    }

    #[test]
    fn source_is_kept_for_wrapped_errors() {
        use std::error::Error;

        assert!(ServerError::from(CryptoError::AuthenticationFailure).source().is_some());
        assert!(ServerError::Io("disk full".to_string()).source().is_none());
    }
}
