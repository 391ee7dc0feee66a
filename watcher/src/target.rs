//! Resolution of watch specs into concrete watch targets.

use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::error::{Result, WatcherError};

const GLOB_META: &[char] = &['*', '?', '['];

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// What a session should watch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PathSpec {
    /// Use the session's configured default glob.
    #[default]
    Default,

    /// A glob fragment relative to the session root, or an absolute glob
    /// under it.
    Glob(String),

    /// An explicit list of files, used as given.
    Files(Vec<PathBuf>),
}

impl PathSpec {
    /// Resolve the spec against a session root.
    pub fn resolve(&self, root: &Path, default_glob: &str) -> Result<WatchTarget> {
        match self {
            Self::Files(files) => Ok(WatchTarget::files(files.clone())),
            Self::Default => WatchTarget::from_glob(root, default_glob),
            Self::Glob(glob) => {
                let root_str = root.to_string_lossy();
                let fragment = if root_str.is_empty() {
                    glob.clone()
                } else {
                    glob.replacen(root_str.as_ref(), "", 1)
                };
                WatchTarget::from_glob(root, &fragment)
            }
        }
    }
}

impl From<&str> for PathSpec {
    fn from(glob: &str) -> Self {
        Self::Glob(glob.to_string())
    }
}

impl From<String> for PathSpec {
    fn from(glob: String) -> Self {
        Self::Glob(glob)
    }
}

impl From<Vec<PathBuf>> for PathSpec {
    fn from(files: Vec<PathBuf>) -> Self {
        Self::Files(files)
    }
}

impl<T: Into<PathSpec>> From<Option<T>> for PathSpec {
    fn from(spec: Option<T>) -> Self {
        spec.map_or(Self::Default, Into::into)
    }
}

/// A path registered with the underlying watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRoot {
    /// Registered path.
    pub path: PathBuf,

    /// Whether subdirectories are watched too.
    pub recursive: bool,
}

#[derive(Debug, Clone)]
enum Matcher {
    Tree { base: PathBuf },
    Pattern { base: PathBuf, pattern: Pattern },
    Files(HashSet<PathBuf>),
}

/// A resolved, canonical watch target.
#[derive(Debug, Clone)]
pub struct WatchTarget {
    display: String,
    roots: Vec<WatchRoot>,
    matcher: Matcher,
}

impl WatchTarget {
    fn files(files: Vec<PathBuf>) -> Self {
        let display = files
            .iter()
            .map(|f| f.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let roots = files
            .iter()
            .map(|f| WatchRoot {
                path: f.clone(),
                recursive: false,
            })
            .collect();

        Self {
            display,
            roots,
            matcher: Matcher::Files(files.into_iter().collect()),
        }
    }

    fn from_glob(root: &Path, fragment: &str) -> Result<Self> {
        let fragment = fragment
            .strip_prefix('/')
            .or_else(|| fragment.strip_prefix('\\'))
            .unwrap_or(fragment);
        let root_str = root.to_string_lossy();
        let joined = format!("{}/{fragment}", root_str.trim_end_matches(['/', '\\']));

        if !fragment.contains(GLOB_META) {
            let path = PathBuf::from(joined.trim_end_matches('/'));
            if path.is_file() {
                return Ok(Self::files(vec![path]));
            }
            return Ok(Self {
                display: joined,
                roots: vec![WatchRoot {
                    path: path.clone(),
                    recursive: true,
                }],
                matcher: Matcher::Tree { base: path },
            });
        }

        let pattern =
            Pattern::new(&joined).map_err(|e| WatcherError::InvalidPattern(format!("{joined}: {e}")))?;
        let base = literal_base(Path::new(&joined));

        Ok(Self {
            display: joined,
            roots: vec![WatchRoot {
                path: base.clone(),
                recursive: true,
            }],
            matcher: Matcher::Pattern { base, pattern },
        })
    }

    /// Paths registered with the underlying watcher.
    pub fn roots(&self) -> &[WatchRoot] {
        &self.roots
    }

    /// Whether an event for `path` belongs to this target.
    pub fn matches(&self, path: &Path, is_dir: bool) -> bool {
        match &self.matcher {
            Matcher::Tree { base } => path != base && path.starts_with(base),
            Matcher::Pattern { base, pattern } => {
                if path == base || !path.starts_with(base) {
                    return false;
                }
                is_dir || pattern.matches_path_with(path, MATCH_OPTIONS)
            }
            Matcher::Files(files) => !is_dir && files.contains(path),
        }
    }

    /// Directories and files that currently exist inside the target.
    pub fn scan(&self) -> TreeSnapshot {
        let mut snapshot = TreeSnapshot::default();

        let base = match &self.matcher {
            Matcher::Tree { base } | Matcher::Pattern { base, .. } => base,
            Matcher::Files(files) => {
                snapshot.files = files.iter().filter(|f| f.is_file()).cloned().collect();
                return snapshot;
            }
        };

        for entry in WalkDir::new(base).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_dir() {
                snapshot.dirs.insert(entry.into_path());
            } else {
                snapshot.files.insert(entry.into_path());
            }
        }
        snapshot
    }
}

/// Paths present when a target was bound.
#[derive(Debug, Clone, Default)]
pub struct TreeSnapshot {
    /// Existing directories.
    pub dirs: HashSet<PathBuf>,

    /// Existing files.
    pub files: HashSet<PathBuf>,
}

impl fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// Longest leading run of components without glob metacharacters.
fn literal_base(pattern: &Path) -> PathBuf {
    let mut base = PathBuf::new();
    for component in pattern.components() {
        if let Component::Normal(part) = component {
            if part.to_string_lossy().contains(GLOB_META) {
                break;
            }
        }
        base.push(component);
    }
    base
}
