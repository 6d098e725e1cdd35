//! Error types for the visit beacon system
//!
//! Errors only surface on the configuration and collector layers. The
//! tracking path itself converts every error into a log line and a
//! [`crate::DispatchEvent`], so nothing here ever reaches page rendering.

use thiserror::Error;

/// Result type alias for beacon operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the visit beacon system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from the collector API)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Resource not found (e.g. no project bound to the access token)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Collector-specific error
    #[error("Collector error ({collector}): {message}")]
    Collector {
        /// Collector name
        collector: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a collector-specific error
    pub fn collector(collector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collector {
            collector: collector.into(),
            message: message.into(),
        }
    }
}
