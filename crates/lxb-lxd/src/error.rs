//! Error types for lxb-lxd.

use thiserror::Error;

/// Result type alias for lxb-lxd operations.
pub type Result<T> = std::result::Result<T, LxdError>;

/// Errors that can occur while talking to LXD.
#[derive(Debug, Error)]
pub enum LxdError {
    /// Transport failure on the Unix socket
    #[error("LXD request failed: {0}")]
    Http(#[from] hyper::Error),

    /// The daemon answered with an error envelope
    #[error("LXD error {code}: {message}")]
    Api { code: u16, message: String },

    /// A background operation finished unsuccessfully
    #[error("LXD operation {id} failed: {message}")]
    Operation { id: String, message: String },

    /// The response did not have the shape we expected
    #[error("unexpected LXD response: {0}")]
    Protocol(String),

    /// Exec websocket failure
    #[error("exec channel error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LxdError {
    /// True when the daemon reported that the requested object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { code: 404, .. })
    }
}
