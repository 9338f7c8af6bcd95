//! Core error types for SiteKit.
//!
//! This module defines the central error type shared by the content and theme
//! crates. Each subsystem error is represented as a variant for clear error
//! propagation across crate boundaries.

use thiserror::Error;

/// Central error type for SiteKit operations.
#[derive(Error, Debug)]
pub enum SiteError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors (invalid ids, unknown component types)
    #[error("validation error: {0}")]
    Validation(String),

    /// Content shape errors (content that is not a JSON object)
    #[error("invalid content: {0}")]
    InvalidContent(String),

    /// JSON serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `SiteError`.
pub type Result<T> = std::result::Result<T, SiteError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SiteError::Validation("bad section id".to_string());
        assert_eq!(err.to_string(), "validation error: bad section id");

        let err = ConfigError::InvalidValue {
            field: "api.base_url".to_string(),
            reason: "must not be empty".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value for api.base_url: must not be empty"
        );
    }

    #[test]
    fn test_error_from_config() {
        let site_err: SiteError = ConfigError::NoConfigDir.into();
        assert!(matches!(site_err, SiteError::Config(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let site_err: SiteError = json_err.into();
        assert!(matches!(site_err, SiteError::Serialization(_)));
    }
}
