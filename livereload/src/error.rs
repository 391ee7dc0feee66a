//! Error types for live-reload.

use std::net::SocketAddr;

use thiserror::Error;

/// Result type alias for live-reload operations.
pub type Result<T> = std::result::Result<T, LiveReloadError>;

/// Errors that can occur while serving or pushing live-reload notifications.
#[derive(Error, Debug)]
pub enum LiveReloadError {
    /// The notification server could not bind its port.
    #[error("failed to bind live-reload server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A push was attempted while no server is listening.
    #[error("live-reload server is not running")]
    ServerNotRunning,

    /// The server answered a push with a non-success status.
    #[error("push rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
