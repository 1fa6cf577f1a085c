//! Error types for depth synchronization

use std::time::Duration;
use thiserror::Error;

use crate::{LevelParseError, SymbolParseError};

/// Main error type for depth synchronization
#[derive(Error, Debug)]
pub enum DepthError {
    // === Connection Errors ===
    /// Connection attempt timed out
    #[error("Connection timeout after {timeout:?} to {url}")]
    ConnectionTimeout { url: String, timeout: Duration },

    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    // === REST Errors ===
    /// HTTP request could not be completed
    #[error("Request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },

    // === Protocol Errors ===
    /// Failed to parse JSON message
    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String, raw: Option<String> },

    /// A price or quantity could not be parsed
    #[error(transparent)]
    MalformedLevel(#[from] LevelParseError),

    /// Symbol could not be parsed
    #[error(transparent)]
    InvalidSymbol(#[from] SymbolParseError),

    // === Internal Errors ===
    /// Internal channel was closed unexpectedly
    #[error("Internal channel closed unexpectedly")]
    ChannelClosed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DepthError {
    /// Returns true if this error is potentially recoverable via retry
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionTimeout { .. }
            | Self::WebSocket(_)
            | Self::RequestFailed { .. } => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Create an invalid JSON error from a serde error
    pub fn invalid_json(err: &serde_json::Error, raw: Option<&str>) -> Self {
        Self::InvalidJson {
            message: err.to_string(),
            raw: raw.map(str::to_string),
        }
    }
}

/// Result type alias for depth operations
pub type DepthResult<T> = Result<T, DepthError>;
