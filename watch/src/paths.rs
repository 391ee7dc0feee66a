//! Path helpers shared by the dispatcher and collaborators.

use std::path::{Path, PathBuf};

use kiln_watcher::relative_slash_path;

/// Map a path under `source_root` onto the same relative path under
/// `dest_root`. `None` when `path` is outside the source tree.
pub fn source_to_dest(path: &Path, source_root: &Path, dest_root: &Path) -> Option<PathBuf> {
    path.strip_prefix(source_root)
        .ok()
        .map(|relative| dest_root.join(relative))
}

/// Lowercased extension without the dot.
pub fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Path for log lines: relative to `root`, forward slashes, leading `/`.
pub fn trim_root(path: &Path, root: &Path) -> String {
    match relative_slash_path(path, root) {
        Some(relative) => format!("/{relative}"),
        None => path.display().to_string().replace('\\', "/"),
    }
}
