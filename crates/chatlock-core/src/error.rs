//! Error types for the access gate.
//!
//! Every gate operation returns a structured [`GateError`]; the HTTP layer maps
//! kinds to status codes. No variant carries PIN material or grant tokens.

use std::time::Duration;

use thiserror::Error;

use crate::storage::StorageError;

/// Errors returned by [`AccessGate`](crate::AccessGate) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// Input failed validation (empty id, malformed PIN format)
    #[error("validation failed: {0}")]
    Validation(String),

    /// The owner has not set a PIN yet
    ///
    /// Returned identically from lock, unlock and verify.
    #[error("no PIN set")]
    NoPin,

    /// PIN did not match the stored hash
    #[error("invalid PIN")]
    InvalidPin,

    /// Too many failed attempts; retry after the cooldown
    #[error("too many attempts, retry in {cooldown_remaining:?}")]
    RateLimited {
        /// Time until the cooldown lapses
        cooldown_remaining: Duration,
    },

    /// Conversation is locked and no valid grant was presented
    #[error("chat locked, PIN required")]
    Locked,

    /// Owner does not exist
    #[error("user not found")]
    NotFound,

    /// PIN hashing failed unexpectedly
    #[error("internal error: {0}")]
    Internal(String),

    /// Persistence layer failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl GateError {
    /// Short machine-readable code for API bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::NoPin => "NO_PIN",
            Self::InvalidPin => "INVALID_PIN",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Locked => "LOCKED",
            Self::NotFound => "NOT_FOUND",
            Self::Internal(_) | Self::Storage(_) => "INTERNAL",
        }
    }

    /// Returns true if the error reflects server trouble rather than the
    /// caller's input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_) | Self::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(GateError::NoPin.code(), "NO_PIN");
        assert_eq!(GateError::InvalidPin.code(), "INVALID_PIN");
        assert_eq!(GateError::Validation("x".into()).code(), "VALIDATION");
        assert_eq!(
            GateError::RateLimited { cooldown_remaining: Duration::from_secs(1) }.code(),
            "RATE_LIMITED"
        );
    }

    #[test]
    fn storage_failures_are_internal() {
        assert!(GateError::Storage(StorageError::Io("disk".into())).is_internal());
        assert!(!GateError::Locked.is_internal());
        assert!(!GateError::InvalidPin.is_internal());
    }
}
