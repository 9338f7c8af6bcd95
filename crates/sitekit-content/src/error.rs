//! Error types for section content operations.

use sitekit_core::SiteError;
use thiserror::Error;

/// Errors that can occur while reading or writing section content.
#[derive(Error, Debug)]
pub enum ContentError {
    /// Non-success HTTP status from the backend
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

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Content that is not a JSON object, or otherwise malformed
    #[error("invalid content: {0}")]
    InvalidContent(String),

    /// Errors bubbling up from shared types (validation, content shape)
    #[error(transparent)]
    Core(#[from] SiteError),

    /// The section handle was closed before the operation
    #[error("section handle closed")]
    Closed,

    /// Preview session operation that needs a loaded page
    #[error("no page loaded in preview session")]
    NoPageLoaded,

    /// Component registry rejected a registration
    #[error("registration rejected: {0}")]
    Registration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl ContentError {
    /// Whether this error is an HTTP 404 from the backend.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}

/// Result type alias for content operations.
pub type Result<T> = std::result::Result<T, ContentError>;
