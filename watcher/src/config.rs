//! Configuration types for watch sessions.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::event::SessionRole;

/// Default grace delay applied after readiness for embedding callers.
pub const DEFAULT_READY_GRACE: Duration = Duration::from_millis(700);

/// Configuration for one watch session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Which tree this session watches.
    pub role: SessionRole,

    /// Root of the watched tree.
    pub root: PathBuf,

    /// Glob used when `start` receives no explicit spec. Empty watches the
    /// whole root.
    pub default_glob: String,

    /// Delay between the watcher's ready signal and `start` resolving.
    pub ready_grace: Duration,

    /// Interactive callers skip the ready grace.
    pub interactive: bool,

    /// Patterns to exclude (glob patterns).
    pub exclude_patterns: Vec<String>,
}

impl SessionConfig {
    /// Create a new session config.
    pub fn new(role: SessionRole, root: impl Into<PathBuf>) -> Self {
        Self {
            role,
            root: root.into(),
            default_glob: String::new(),
            ready_grace: DEFAULT_READY_GRACE,
            interactive: false,
            exclude_patterns: Self::default_excludes(),
        }
    }

    /// Set the default glob.
    pub fn with_default_glob(mut self, glob: impl Into<String>) -> Self {
        self.default_glob = glob.into();
        self
    }

    /// Set the ready grace delay.
    pub fn with_ready_grace(mut self, grace: Duration) -> Self {
        self.ready_grace = grace;
        self
    }

    /// Mark the session as driven by an interactive operator.
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Add an exclude pattern.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_patterns.push(pattern.into());
        self
    }

    /// Delay `start` applies after the ready signal.
    pub fn effective_grace(&self) -> Duration {
        if self.interactive {
            Duration::ZERO
        } else {
            self.ready_grace
        }
    }

    /// Editor artifacts that never represent a real edit.
    fn default_excludes() -> Vec<String> {
        vec![
            "**/*.swp".to_string(),
            "**/*.swx".to_string(),
            "**/*~".to_string(),
            "**/.DS_Store".to_string(),
            "**/Thumbs.db".to_string(),
        ]
    }

    /// Check if a path should be excluded.
    pub fn should_exclude(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();

        for pattern in &self.exclude_patterns {
            if let Ok(glob) = glob::Pattern::new(pattern) {
                if glob.matches(&path_str) {
                    return true;
                }
            }
        }

        false
    }
}
