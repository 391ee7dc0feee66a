//! Error types for watch sessions.

use thiserror::Error;

use crate::event::SessionRole;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Errors that can occur while binding or running a watch session.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// A watch root does not exist.
    #[error("watch root not found: {0}")]
    RootNotFound(String),

    /// Invalid glob in a path spec.
    #[error("invalid watch pattern: {0}")]
    InvalidPattern(String),

    /// The session reported an error before it became ready.
    #[error("{0} watcher failed before becoming ready: {1}")]
    NotReady(SessionRole, String),

    /// The session was stopped while a start was still waiting for readiness.
    #[error("{0} watcher was stopped before becoming ready")]
    Interrupted(SessionRole),

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
