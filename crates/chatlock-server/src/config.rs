//! Server configuration.

use std::time::Duration;

use chatlock_core::GateConfig;
use chatlock_crypto::KEY_SIZE;

use crate::server_error::ServerError;

/// Minimum grant secret length in bytes
pub const MIN_GRANT_SECRET_LEN: usize = 32;

/// Default number of peer profiles kept in the directory cache
pub const DEFAULT_DIRECTORY_CACHE_CAPACITY: usize = 1024;

/// Default lifetime of a cached peer profile
pub const DEFAULT_DIRECTORY_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Server configuration.
///
/// Secrets are redacted from the `Debug` output.
#[derive(Clone)]
pub struct ServerConfig {
    /// Throttle and grant tuning
    pub gate: GateConfig,
    /// HMAC key for grant tokens
    pub grant_secret: Vec<u8>,
    /// Master key for attachment key derivation
    pub media_master_key: [u8; KEY_SIZE],
    /// Maximum number of cached peer profiles
    pub directory_cache_capacity: usize,
    /// Lifetime of a cached peer profile
    pub directory_cache_ttl: Duration,
}

impl ServerConfig {
    /// Configuration with default tuning and the given secrets.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` if the grant secret is shorter than
    ///   [`MIN_GRANT_SECRET_LEN`]
    pub fn new(grant_secret: Vec<u8>, media_master_key: [u8; KEY_SIZE]) -> Result<Self, ServerError> {
        if grant_secret.len() < MIN_GRANT_SECRET_LEN {
            return Err(ServerError::Config(format!(
                "grant secret must be at least {MIN_GRANT_SECRET_LEN} bytes, got {}",
                grant_secret.len()
            )));
        }

        Ok(Self {
            gate: GateConfig::default(),
            grant_secret,
            media_master_key,
            directory_cache_capacity: DEFAULT_DIRECTORY_CACHE_CAPACITY,
            directory_cache_ttl: DEFAULT_DIRECTORY_CACHE_TTL,
        })
    }

    /// Configuration from hex-encoded secrets, as passed on the command line.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` if either value is not hex, the media key is
    ///   not exactly [`KEY_SIZE`] bytes, or the grant secret is too short
    pub fn from_hex(grant_secret_hex: &str, media_key_hex: &str) -> Result<Self, ServerError> {
        let grant_secret = hex::decode(grant_secret_hex.trim())
            .map_err(|e| ServerError::Config(format!("grant secret: {e}")))?;

        let media_key = hex::decode(media_key_hex.trim())
            .map_err(|e| ServerError::Config(format!("media key: {e}")))?;
        let media_master_key: [u8; KEY_SIZE] = media_key.as_slice().try_into().map_err(|_| {
            ServerError::Config(format!(
                "media key must be {KEY_SIZE} bytes, got {}",
                media_key.len()
            ))
        })?;

        Self::new(grant_secret, media_master_key)
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("gate", &self.gate)
            .field("grant_secret", &"<redacted>")
            .field("media_master_key", &"<redacted>")
            .field("directory_cache_capacity", &self.directory_cache_capacity)
            .field("directory_cache_ttl", &self.directory_cache_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_hex_accepts_valid_secrets() {
        let config = ServerConfig::from_hex(&"ab".repeat(32), &"cd".repeat(32)).unwrap();

        assert_eq!(config.grant_secret, vec![0xAB; 32]);
        assert_eq!(config.media_master_key, [0xCD; 32]);
        assert_eq!(config.gate, GateConfig::default());
    }

    #[test]
    fn short_grant_secret_is_rejected() {
        let err = ServerConfig::from_hex(&"ab".repeat(16), &"cd".repeat(32)).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn media_key_must_be_exactly_32_bytes() {
        assert!(ServerConfig::from_hex(&"ab".repeat(32), &"cd".repeat(31)).is_err());
        assert!(ServerConfig::from_hex(&"ab".repeat(32), &"cd".repeat(33)).is_err());
        assert!(ServerConfig::from_hex(&"ab".repeat(32), "not hex").is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = ServerConfig::new(vec![0x42; 32], [0x17; 32]).unwrap();
        let debug = format!("{config:?}");

        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("66"));
    }
}
