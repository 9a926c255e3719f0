//! Session authentication configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::crypto::{HashAlgorithm, HmacAlgorithm, SignatureAlgorithm};

/// Authentication settings shared by every credential of a client.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// hmac_algorithm = "HMACSHA256"
/// signature_algorithm = "RSA-SHA1"
/// max_refresh_attempts = 1
/// refresh_wait_timeout = "60s"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Algorithm of the per-session shared secret.
    /// Supported: "HMACSHA1", "HMACSHA256", "HMACSHA512"
    pub hmac_algorithm: String,

    /// Digest used for `<info-hash>`.
    /// Supported: "SHA1", "SHA256", "SHA512"
    pub hash_algorithm: String,

    /// Signature scheme for certificate credentials.
    /// Supported: "RSA-SHA1", "RSA-SHA256"
    pub signature_algorithm: String,

    /// How many times a request is retried after its session expired.
    pub max_refresh_attempts: u32,

    /// How long a caller waits for another task's in-flight refresh
    /// before giving up. Keep it above the HTTP request timeout, since a
    /// refresh is one round trip made while holding the lock.
    #[serde(with = "humantime_serde")]
    pub refresh_wait_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            hmac_algorithm: "HMACSHA256".to_string(),
            hash_algorithm: "SHA256".to_string(),
            signature_algorithm: "RSA-SHA1".to_string(),
            max_refresh_attempts: 1,
            refresh_wait_timeout: Duration::from_secs(60),
        }
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - An algorithm name is not supported
    /// - `max_refresh_attempts` is zero
    /// - `refresh_wait_timeout` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.hmac()?;
        self.hash()?;
        self.signature()?;

        if self.max_refresh_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "max_refresh_attempts must be > 0".to_string(),
            ));
        }
        if self.refresh_wait_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "refresh_wait_timeout must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Parsed shared-secret algorithm.
    pub fn hmac(&self) -> Result<HmacAlgorithm, ConfigError> {
        self.hmac_algorithm.parse().map_err(|_| {
            ConfigError::InvalidValue(format!(
                "Invalid hmac_algorithm: '{}'. Must be HMACSHA1, HMACSHA256, or HMACSHA512",
                self.hmac_algorithm
            ))
        })
    }

    /// Parsed info-hash algorithm.
    pub fn hash(&self) -> Result<HashAlgorithm, ConfigError> {
        self.hash_algorithm.parse().map_err(|_| {
            ConfigError::InvalidValue(format!(
                "Invalid hash_algorithm: '{}'. Must be SHA1, SHA256, or SHA512",
                self.hash_algorithm
            ))
        })
    }

    /// Parsed certificate signature scheme.
    pub fn signature(&self) -> Result<SignatureAlgorithm, ConfigError> {
        self.signature_algorithm.parse().map_err(|_| {
            ConfigError::InvalidValue(format!(
                "Invalid signature_algorithm: '{}'. Must be RSA-SHA1 or RSA-SHA256",
                self.signature_algorithm
            ))
        })
    }
}
