//! Per-path quiet window for change notifications.
//!
//! Editors often produce several notifications for one save. The gate lets the
//! first one through and suppresses repeats for the same path until the path
//! has been quiet for the whole window.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::Instant;

/// Default quiet window.
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(300);

/// Tracks recently seen paths.
///
/// Single owner: the gate is queried from one session's event stream only.
#[derive(Debug)]
pub struct DebounceGate {
    window: Duration,
    recent: HashMap<PathBuf, Instant>,
}

impl DebounceGate {
    /// Create a gate with the given quiet window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            recent: HashMap::new(),
        }
    }

    /// Returns `true` when `path` was not seen within the window, recording it
    /// as seen at `now`.
    pub fn should_process(&mut self, path: &Path, now: Instant) -> bool {
        let window = self.window;
        self.recent
            .retain(|_, seen| now.saturating_duration_since(*seen) < window);

        if self.recent.contains_key(path) {
            return false;
        }

        self.recent.insert(path.to_path_buf(), now);
        true
    }

    /// Forget every recorded path.
    pub fn reset(&mut self) {
        self.recent.clear();
    }

    /// Number of paths currently inside the window.
    pub fn len(&self) -> usize {
        self.recent.len()
    }

    /// Whether no path is inside the window.
    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// The configured window.
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for DebounceGate {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_WINDOW)
    }
}
