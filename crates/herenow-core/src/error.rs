//! Core error types for herenow-core.
//!
//! Lookup failures never escape the engine: each rule maps them onto its
//! own fail-open or fail-closed verdict. The remaining variants surface
//! from configuration loading and from callers that drive collaborators
//! directly.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Core error type for herenow-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Collaborator lookup errors
    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors reported by the read-only collaborators (location, calendar,
/// dependency lookups) and by the audit sink.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    /// The requested record does not exist
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// The backing store failed (network, database, ...)
    #[error("{service} failed: {message}")]
    Backend { service: String, message: String },

    /// The call did not return within the configured budget
    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl LookupError {
    /// Shorthand for a backend failure.
    pub fn backend(service: impl Into<String>, message: impl Into<String>) -> Self {
        LookupError::Backend {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from the timeout guard rather than the collaborator.
    pub fn is_timeout(&self) -> bool {
        matches!(self, LookupError::Timeout { .. })
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
