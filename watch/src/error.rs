//! Error types for watch orchestration.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for watch operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors that can occur while orchestrating watch sessions.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The source root does not exist.
    #[error("missing source directory: {}", .0.display())]
    MissingSourceDirectory(PathBuf),

    /// Source and destination roots are unusable together.
    #[error("invalid paths: {0}")]
    InvalidPaths(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Watch session error.
    #[error("watcher error: {0}")]
    Watcher(#[from] kiln_watcher::WatcherError),

    /// Live-reload error.
    #[error("live-reload error: {0}")]
    LiveReload(#[from] kiln_livereload::LiveReloadError),

    /// The build pipeline rejected a submission.
    #[error("build failed: {0:#}")]
    Pipeline(anyhow::Error),

    /// The cleanup routine failed.
    #[error("cleanup failed: {0:#}")]
    Cleanup(anyhow::Error),

    /// Include fan-out enumeration failed.
    #[error("enumeration failed: {0:#}")]
    Enumerate(anyhow::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
