//! Authentication error types.
//!
//! This module defines all error types that can occur while establishing,
//! caching and refreshing application sessions.

use std::fmt;

/// Errors that can occur during session authentication.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The application credential is malformed or incomplete.
    #[error("Invalid credential: {message}")]
    InvalidCredential {
        /// Description of why the credential is invalid.
        message: String,
    },

    /// A hash, HMAC or signature algorithm name is not supported.
    #[error("Unsupported algorithm: {name}")]
    UnsupportedAlgorithm {
        /// The algorithm name as it appeared on the wire or in config.
        name: String,
    },

    /// Producing a signature or MAC failed.
    #[error("Signing failed: {message}")]
    Signing {
        /// Description of the signing failure.
        message: String,
    },

    /// The application private key could not be loaded.
    #[error("Failed to load key: {message}")]
    KeyLoad {
        /// Description of the key loading failure.
        message: String,
    },

    /// The session token has expired and cannot be refreshed by this credential.
    ///
    /// Returned from [`Credential::refresh`](crate::Credential::refresh) by
    /// credentials that have no way to obtain a new session. Connections
    /// report it as an expired session instead of retrying.
    #[error("Session token expired")]
    TokenExpired,

    /// The service rejected or failed the authentication round trip.
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Description of the failure, usually the service error message.
        message: String,
    },

    /// Waiting for another task's refresh took too long.
    #[error("Timed out waiting for session refresh of application {application_id}")]
    RefreshTimeout {
        /// Application whose keyset pair was locked.
        application_id: String,
    },

    /// The auth configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidCredential` error.
    #[must_use]
    pub fn invalid_credential(message: impl Into<String>) -> Self {
        Self::InvalidCredential {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedAlgorithm` error.
    #[must_use]
    pub fn unsupported_algorithm(name: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm { name: name.into() }
    }

    /// Creates a new `Signing` error.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates a new `KeyLoad` error.
    #[must_use]
    pub fn key_load(message: impl Into<String>) -> Self {
        Self::KeyLoad {
            message: message.into(),
        }
    }

    /// Creates a new `Authentication` error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates a new `RefreshTimeout` error.
    #[must_use]
    pub fn refresh_timeout(application_id: impl fmt::Display) -> Self {
        Self::RefreshTimeout {
            application_id: application_id.to_string(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if retrying the request after a refresh may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TokenExpired | Self::RefreshTimeout { .. })
    }

    /// Returns `true` if the error is caused by local setup rather than the service.
    #[must_use]
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredential { .. }
                | Self::UnsupportedAlgorithm { .. }
                | Self::KeyLoad { .. }
                | Self::Configuration { .. }
        )
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidCredential { .. } => ErrorCategory::Credential,
            Self::UnsupportedAlgorithm { .. } => ErrorCategory::Crypto,
            Self::Signing { .. } => ErrorCategory::Crypto,
            Self::KeyLoad { .. } => ErrorCategory::Credential,
            Self::TokenExpired => ErrorCategory::Session,
            Self::Authentication { .. } => ErrorCategory::Session,
            Self::RefreshTimeout { .. } => ErrorCategory::Session,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of authentication errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Application identity material (keys, thumbprints, ids).
    Credential,
    /// Hashing, HMAC and signature primitives.
    Crypto,
    /// Session token issuance and lifetime.
    Session,
    /// Configuration errors.
    Configuration,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credential => write!(f, "credential"),
            Self::Crypto => write!(f, "crypto"),
            Self::Session => write!(f, "session"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
