use thiserror::Error;

/// Core error types for HealthVault client operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Invalid date/time: {0}")]
    InvalidDateTime(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Missing element: {0}")]
    MissingElement(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Time parsing error: {0}")]
    TimeError(#[from] time::error::Parse),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),
}

impl CoreError {
    /// Create a new InvalidId error
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId(id.into())
    }

    /// Create a new InvalidDateTime error
    pub fn invalid_date_time(datetime: impl Into<String>) -> Self {
        Self::InvalidDateTime(datetime.into())
    }

    /// Create a new Xml error
    pub fn xml(message: impl Into<String>) -> Self {
        Self::Xml(message.into())
    }

    /// Create a new MissingElement error
    pub fn missing_element(name: impl Into<String>) -> Self {
        Self::MissingElement(name.into())
    }

    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Check if this error was caused by malformed input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidId(_)
                | Self::InvalidDateTime(_)
                | Self::JsonError(_)
                | Self::UrlError(_)
                | Self::TimeError(_)
        )
    }

    /// Check if this error came from a malformed service payload
    pub fn is_wire_error(&self) -> bool {
        matches!(self, Self::Xml(_) | Self::MissingElement(_))
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidId(_) | Self::InvalidDateTime(_) | Self::UrlError(_) => {
                ErrorCategory::Validation
            }
            Self::Xml(_) | Self::MissingElement(_) => ErrorCategory::Wire,
            Self::JsonError(_) => ErrorCategory::Serialization,
            Self::TimeError(_) => ErrorCategory::Validation,
            Self::Configuration(_) => ErrorCategory::Configuration,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Wire,
    Serialization,
    Configuration,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Wire => write!(f, "wire"),
            Self::Serialization => write!(f, "serialization"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CoreError::invalid_id("not-a-uuid");
        assert_eq!(err.to_string(), "Invalid identifier: not-a-uuid");
        assert!(err.is_client_error());
        assert!(!err.is_wire_error());
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_wire_errors() {
        let err = CoreError::missing_element("status/code");
        assert_eq!(err.to_string(), "Missing element: status/code");
        assert!(err.is_wire_error());
        assert_eq!(err.category(), ErrorCategory::Wire);

        let err = CoreError::xml("unexpected EOF");
        assert!(err.is_wire_error());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Validation.to_string(), "validation");
        assert_eq!(ErrorCategory::Wire.to_string(), "wire");
        assert_eq!(ErrorCategory::Configuration.to_string(), "configuration");
    }
}
