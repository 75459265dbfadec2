//! User identifiers and references.
//!
//! Callers hand peers to the gate in two shapes: a bare id string, or a
//! resolved profile object that carries its own id. [`Reference`] accepts
//! either and always yields the id.

use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// Longest accepted id in bytes
pub const MAX_USER_ID_LEN: usize = 128;

/// Identifier of a user in the external account store.
///
/// 1 to [`MAX_USER_ID_LEN`] bytes of `[A-Za-z0-9_-]`. Ids end up in cookie
/// names and length-prefixed grant tokens, so anything else is refused at
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Wrap a raw id.
    ///
    /// # Errors
    ///
    /// - `Validation`: `id` is empty, longer than [`MAX_USER_ID_LEN`], or
    ///   contains a character outside `[A-Za-z0-9_-]`
    pub fn new(id: impl Into<String>) -> Result<Self, GateError> {
        let id = id.into();
        if id.is_empty() {
            return Err(GateError::Validation("user id must not be empty".to_string()));
        }
        if id.len() > MAX_USER_ID_LEN {
            return Err(GateError::Validation(format!(
                "user id must be at most {MAX_USER_ID_LEN} bytes"
            )));
        }
        if !id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
            return Err(GateError::Validation(
                "user id may only contain letters, digits, '-' and '_'".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = GateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Anything that knows which user it describes.
pub trait HasId {
    /// Id of the described user.
    fn id(&self) -> &UserId;
}

impl HasId for UserId {
    fn id(&self) -> &UserId {
        self
    }
}

/// A user given either by id or as a resolved record.
///
/// Deserializes from a bare string (`Id`) or from an object (`Resolved`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference<T> {
    /// Bare id
    Id(UserId),
    /// Resolved record
    Resolved(T),
}

impl<T: HasId> Reference<T> {
    /// Id of the referenced user, whatever the shape.
    pub fn id(&self) -> &UserId {
        match self {
            Self::Id(id) => id,
            Self::Resolved(record) => record.id(),
        }
    }

    /// The resolved record, if this reference carries one.
    pub fn resolved(&self) -> Option<&T> {
        match self {
            Self::Id(_) => None,
            Self::Resolved(record) => Some(record),
        }
    }

    /// Consume the reference, keeping only the id.
    pub fn into_id(self) -> UserId {
        match self {
            Self::Id(id) => id,
            Self::Resolved(record) => record.id().clone(),
        }
    }
}

impl<T> From<UserId> for Reference<T> {
    fn from(id: UserId) -> Self {
        Self::Id(id)
    }
}
