//! Change events emitted by watch sessions.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Which tree a session watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    /// The source tree, feeding the build pipeline.
    Source,

    /// The destination tree, feeding live-reload.
    Destination,
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Destination => f.write_str("destination"),
        }
    }
}

/// Kind of change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A file appeared.
    AddFile,

    /// A directory appeared.
    AddDir,

    /// A file's content or metadata changed.
    Change,

    /// A file was removed.
    Remove,

    /// A directory was removed.
    RemoveDir,

    /// The underlying watcher reported an error.
    Error,

    /// The session finished binding and is delivering events.
    Ready,
}

impl ChangeKind {
    /// Whether this kind describes a directory rather than a file.
    pub fn is_directory(self) -> bool {
        matches!(self, Self::AddDir | Self::RemoveDir)
    }

    /// Whether this kind carries a filesystem path.
    pub fn has_path(self) -> bool {
        !matches!(self, Self::Error | Self::Ready)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AddFile => "add",
            Self::AddDir => "add directory",
            Self::Change => "change",
            Self::Remove => "removed",
            Self::RemoveDir => "removed directory",
            Self::Error => "error",
            Self::Ready => "ready",
        };
        f.write_str(label)
    }
}

/// A change observed by one session.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    /// The kind of event.
    pub kind: ChangeKind,

    /// Path to the affected file or directory. Empty for `Ready` and `Error`.
    pub path: PathBuf,

    /// Session that observed the event.
    pub session: SessionRole,

    /// When the event occurred.
    pub timestamp: DateTime<Utc>,

    /// Monotonic observation time, used for quiet windows.
    #[serde(skip)]
    pub observed_at: Instant,

    /// Error detail for `Error` events.
    pub message: Option<String>,
}

impl ChangeEvent {
    /// Create a new change event.
    pub fn new(session: SessionRole, kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            session,
            timestamp: Utc::now(),
            observed_at: Instant::now(),
            message: None,
        }
    }

    /// Create a readiness event.
    pub fn ready(session: SessionRole) -> Self {
        Self::new(session, ChangeKind::Ready, PathBuf::new())
    }

    /// Create an error event.
    pub fn error(session: SessionRole, message: impl Into<String>) -> Self {
        let mut event = Self::new(session, ChangeKind::Error, PathBuf::new());
        event.message = Some(message.into());
        event
    }

    /// Override the observation instant.
    pub fn observed(mut self, at: Instant) -> Self {
        self.observed_at = at;
        self
    }

    /// Lowercased extension of the event path, without the dot.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }

    /// Path relative to `root` with forward slashes, or `None` when the path
    /// lies outside `root`.
    pub fn relative_to(&self, root: &Path) -> Option<String> {
        relative_slash_path(&self.path, root)
    }
}

/// Render `path` relative to `root` using `/` separators.
pub fn relative_slash_path(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Some(parts.join("/"))
}
