//! PIN hashing and verification.
//!
//! PINs are 4-8 ASCII digits. Hashes are PHC strings, so parameters travel
//! with the hash and can be raised without invalidating existing PINs.

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};

use crate::error::GateError;

/// Shortest accepted PIN
pub const MIN_PIN_LEN: usize = 4;

/// Longest accepted PIN
pub const MAX_PIN_LEN: usize = 8;

/// Check that `pin` is 4-8 ASCII digits.
///
/// # Errors
///
/// - `Validation`: wrong length or non-digit characters
pub fn validate_pin_format(pin: &str) -> Result<(), GateError> {
    let valid = (MIN_PIN_LEN..=MAX_PIN_LEN).contains(&pin.len())
        && pin.bytes().all(|b| b.is_ascii_digit());

    if valid {
        Ok(())
    } else {
        Err(GateError::Validation(format!("PIN must be {MIN_PIN_LEN}-{MAX_PIN_LEN} digits")))
    }
}

/// Salted, slow PIN hashing.
///
/// Verification must not leak how much of the PIN matched.
pub trait PinHasher: Clone + Send + Sync + 'static {
    /// Hash `pin` with `salt` into a self-describing string.
    fn hash(&self, pin: &str, salt: &[u8]) -> Result<String, GateError>;

    /// True if `pin` matches `hash`. Malformed hashes never match.
    fn verify(&self, pin: &str, hash: &str) -> bool;
}

/// Argon2id PIN hasher.
#[derive(Clone)]
pub struct Argon2PinHasher {
    params: Params,
}

impl Argon2PinHasher {
    /// Hasher with explicit cost parameters.
    ///
    /// # Errors
    ///
    /// - `Validation`: parameters rejected by argon2
    pub fn with_cost(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, GateError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| GateError::Validation(format!("argon2 parameters: {e}")))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2PinHasher {
    /// argon2 crate defaults (19 MiB, 2 iterations, 1 lane).
    fn default() -> Self {
        Self { params: Params::default() }
    }
}

impl std::fmt::Debug for Argon2PinHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Argon2PinHasher")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .field("p_cost", &self.params.p_cost())
            .finish()
    }
}

impl PinHasher for Argon2PinHasher {
    fn hash(&self, pin: &str, salt: &[u8]) -> Result<String, GateError> {
        let salt = SaltString::encode_b64(salt)
            .map_err(|e| GateError::Internal(format!("PIN salt: {e}")))?;

        let hash = self
            .argon2()
            .hash_password(pin.as_bytes(), &salt)
            .map_err(|e| GateError::Internal(format!("PIN hash: {e}")))?;

        Ok(hash.to_string())
    }

    fn verify(&self, pin: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        // Parameters come from the PHC string, not from `self`
        self.argon2().verify_password(pin.as_bytes(), &parsed).is_ok()
    }
}
