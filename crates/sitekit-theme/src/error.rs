//! Error types for theme and font operations.

use thiserror::Error;

/// Errors that can occur while loading or applying a theme.
#[derive(Error, Debug)]
pub enum ThemeError {
    /// Non-success HTTP status from the theme API
    #[error("API error: status {status}, {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Transport-level failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Theme payload that could not be understood
    #[error("invalid theme: {0}")]
    InvalidTheme(String),

    /// A font stylesheet could not be loaded from a provider
    #[error("font '{family}' failed to load from {provider}: {reason}")]
    Font {
        /// Family name as written in the theme
        family: String,
        /// Provider that was tried
        provider: &'static str,
        /// Failure reason
        reason: String,
    },

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for theme operations.
pub type Result<T> = std::result::Result<T, ThemeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ThemeError::Font {
            family: "Inter".to_string(),
            provider: "fontsource",
            reason: "status 404".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "font 'Inter' failed to load from fontsource: status 404"
        );

        let err = ThemeError::Api {
            status: 503,
            message: "down".to_string(),
        };
        assert!(err.to_string().contains("503"));
    }
}
