//! Pending set of destination changes awaiting a flush.

use indexmap::IndexSet;

/// Relative destination paths accumulated since the last flush.
///
/// Insertion order is kept so a flush reports files in the order they
/// changed; a path changed twice is reported once.
#[derive(Debug, Default)]
pub struct PendingReloadBatch {
    files: IndexSet<String>,
}

impl PendingReloadBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a path. Returns `false` if it was already pending.
    pub fn push(&mut self, file: impl Into<String>) -> bool {
        self.files.insert(file.into())
    }

    /// Drain the batch, leaving it empty.
    pub fn take(&mut self) -> Vec<String> {
        self.files.drain(..).collect()
    }

    /// Discard everything pending without flushing it.
    pub fn clear(&mut self) {
        self.files.clear();
    }

    /// Number of distinct pending paths.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Whether `file` is already pending.
    pub fn contains(&self, file: &str) -> bool {
        self.files.contains(file)
    }
}
