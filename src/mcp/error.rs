//! Error types for the MCP client.

use std::time::Duration;

use thiserror::Error;

/// MCP client error type.
#[derive(Error, Debug)]
pub enum McpError {
    /// The session has not completed the handshake yet.
    #[error("not connected")]
    NotConnected,

    /// `connect()` was called on a session that already left `Disconnected`.
    #[error("session already connected")]
    AlreadyConnected,

    /// The session was closed; it cannot be reused.
    #[error("session closed")]
    Closed,

    /// The server never announced a submission endpoint on the event stream.
    #[error("no session endpoint announced after {attempts} attempts")]
    EndpointDiscovery {
        /// Number of polls performed before giving up.
        attempts: u32,
    },

    /// The `initialize` exchange failed.
    #[error("initialize handshake failed: {0}")]
    Handshake(String),

    /// No response arrived for a request within its timeout.
    #[error("request {id} timed out after {timeout:?}")]
    Timeout {
        /// Correlation identifier of the request.
        id: u64,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// The completion slot was dropped before a response arrived.
    #[error("request {id} cancelled")]
    Cancelled {
        /// Correlation identifier of the request.
        id: u64,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid server URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Result type alias for MCP client operations.
pub type Result<T> = std::result::Result<T, McpError>;
