//! API and media error types.
//!
//! [`ApiError`] is what a request handler can fail with; it knows its HTTP
//! status and response code. Internal failures are logged by the handler and
//! reach the client only as a generic message.

use std::time::Duration;

use chatlock_core::{GateError, StorageError};
use thiserror::Error;

/// Errors from the media read and upload path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Gate refused the read or failed
    #[error(transparent)]
    Gate(#[from] GateError),

    /// No attachment with that id in this conversation
    #[error("message not found")]
    NotFound,

    /// Attachment store failure
    #[error("media storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors a request can end with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No route matches method and path
    #[error("route not found")]
    RouteNotFound,

    /// Request body or query is malformed or incomplete
    #[error("validation failed: {0}")]
    BadRequest(String),

    /// Wrong PIN on unlock; reported with 401 rather than 400
    #[error("invalid PIN")]
    Unauthorized,

    /// Gate operation refused or failed
    #[error(transparent)]
    Gate(#[from] GateError),

    /// Media path refused or failed
    #[error(transparent)]
    Media(#[from] MediaError),
}

impl ApiError {
    /// HTTP status code.
    pub fn status(&self) -> u16 {
        match self {
            Self::RouteNotFound => 404,
            Self::BadRequest(_) => 400,
            Self::Unauthorized => 401,
            Self::Gate(err) | Self::Media(MediaError::Gate(err)) => gate_status(err),
            Self::Media(MediaError::NotFound) => 404,
            Self::Media(MediaError::Storage(_)) => 500,
        }
    }

    /// Machine-readable code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RouteNotFound | Self::Media(MediaError::NotFound) => "NOT_FOUND",
            Self::BadRequest(_) => "VALIDATION",
            Self::Unauthorized => "INVALID_PIN",
            Self::Gate(err) | Self::Media(MediaError::Gate(err)) => err.code(),
            Self::Media(MediaError::Storage(_)) => "INTERNAL",
        }
    }

    /// Human-readable message safe to show to the client.
    ///
    /// Internal failures collapse into one generic message.
    pub fn public_message(&self) -> String {
        if let Some(err) = self.gate_error() {
            return gate_message(err);
        }

        match self {
            Self::RouteNotFound => "Not found".to_string(),
            Self::BadRequest(reason) => reason.clone(),
            Self::Unauthorized => "Invalid PIN".to_string(),
            Self::Media(MediaError::NotFound) => "Message not found".to_string(),
            _ => INTERNAL_MESSAGE.to_string(),
        }
    }

    /// Remaining cooldown, for `429` bodies.
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        match self.gate_error() {
            Some(GateError::RateLimited { cooldown_remaining }) => Some(*cooldown_remaining),
            _ => None,
        }
    }

    /// Returns true if the failure is the server's fault.
    pub fn is_internal(&self) -> bool {
        self.status() >= 500
    }

    fn gate_error(&self) -> Option<&GateError> {
        match self {
            Self::Gate(err) | Self::Media(MediaError::Gate(err)) => Some(err),
            _ => None,
        }
    }
}

const INTERNAL_MESSAGE: &str = "Internal server error";

fn gate_message(err: &GateError) -> String {
    match err {
        GateError::Validation(reason) => reason.clone(),
        GateError::NoPin => "No PIN set. Please create a PIN first.".to_string(),
        GateError::InvalidPin => "Invalid PIN".to_string(),
        GateError::RateLimited { .. } => "Too many attempts. Please wait.".to_string(),
        GateError::Locked => "Chat is locked. PIN required.".to_string(),
        GateError::NotFound => "User not found".to_string(),
        GateError::Internal(_) | GateError::Storage(_) => INTERNAL_MESSAGE.to_string(),
    }
}

fn gate_status(err: &GateError) -> u16 {
    match err {
        GateError::Validation(_) | GateError::NoPin | GateError::InvalidPin => 400,
        GateError::NotFound => 404,
        GateError::Locked => 423,
        GateError::RateLimited { .. } => 429,
        GateError::Internal(_) | GateError::Storage(_) => 500,
    }
}
