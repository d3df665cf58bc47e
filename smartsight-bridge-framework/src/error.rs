//! Error types for the bridge framework.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in a bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// Zenoh connection error.
    #[error("Zenoh connection error: {0}")]
    ZenohConnection(String),

    /// Zenoh session error.
    #[error("Zenoh session error: {0}")]
    ZenohSession(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Publishing error.
    #[error("Failed to publish to {key}: {message}")]
    Publish { key: String, message: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }
}

impl From<zenoh::Error> for BridgeError {
    fn from(err: zenoh::Error) -> Self {
        Self::ZenohSession(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<smartsight_common::Error> for BridgeError {
    fn from(err: smartsight_common::Error) -> Self {
        match err {
            smartsight_common::Error::Config(msg) => Self::ConfigParse(msg),
            smartsight_common::Error::Zenoh(e) => Self::ZenohSession(e.to_string()),
            smartsight_common::Error::Io(e) => Self::Io(e),
            other => Self::Serialization(other.to_string()),
        }
    }
}
