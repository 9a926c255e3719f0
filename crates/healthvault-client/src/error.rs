//! Client error types.

use healthvault_auth::AuthError;
use healthvault_core::CoreError;

/// Errors returned by connections and typed clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The service answered with a non-zero status code.
    #[error("Service error {code}: {message}")]
    Service { code: i32, message: String },

    /// The session kept being rejected after refreshing.
    #[error("Session still expired after {attempts} refresh attempt(s)")]
    SessionExpired { attempts: u32 },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The response was well-formed XML but not what the method returns.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ClientError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedResponse(message.into())
    }

    /// Service status code, if the service produced one.
    pub fn service_code(&self) -> Option<i32> {
        match self {
            Self::Service { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns `true` for failures that happened before reaching the service.
    pub fn is_local(&self) -> bool {
        match self {
            Self::Configuration(_) => true,
            Self::Auth(e) => e.is_setup_error(),
            _ => false,
        }
    }
}

/// Convenience result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
