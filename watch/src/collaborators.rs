//! External collaborators the dispatcher drives, and default implementations
//! used by the binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use glob::MatchOptions;
use tracing::debug;

use crate::paths::source_to_dest;

/// Builds source files into the destination tree.
#[async_trait]
pub trait BuildPipeline: Send + Sync {
    /// Build `files` (absolute source paths, never empty).
    async fn process_build(&self, files: Vec<PathBuf>, incremental: bool) -> anyhow::Result<()>;
}

/// Removes destination output whose source is gone.
#[async_trait]
pub trait Cleaner: Send + Sync {
    /// Remove `dest_path`, a file or a directory tree.
    async fn process_clean(&self, dest_path: &Path, incremental: bool) -> anyhow::Result<()>;
}

/// Lists files matching a glob pattern.
#[async_trait]
pub trait FileEnumerator: Send + Sync {
    async fn enumerate(&self, pattern: &str) -> anyhow::Result<Vec<PathBuf>>;
}

/// The collaborators a dispatcher is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub pipeline: Arc<dyn BuildPipeline>,
    pub cleaner: Arc<dyn Cleaner>,
    pub enumerator: Arc<dyn FileEnumerator>,
}

impl Collaborators {
    /// Wire a pipeline and cleaner, enumerating with [`GlobEnumerator`].
    pub fn new(pipeline: Arc<dyn BuildPipeline>, cleaner: Arc<dyn Cleaner>) -> Self {
        Self {
            pipeline,
            cleaner,
            enumerator: Arc::new(GlobEnumerator),
        }
    }

    pub fn with_enumerator(mut self, enumerator: Arc<dyn FileEnumerator>) -> Self {
        self.enumerator = enumerator;
        self
    }
}

/// Enumerates files with the `glob` crate. Results are sorted.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobEnumerator;

const ENUMERATE_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

#[async_trait]
impl FileEnumerator for GlobEnumerator {
    async fn enumerate(&self, pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
        let pattern = pattern.to_string();
        tokio::task::spawn_blocking(move || {
            let entries = glob::glob_with(&pattern, ENUMERATE_OPTIONS)
                .with_context(|| format!("invalid pattern {pattern}"))?;
            let mut files: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok())
                .filter(|path| path.is_file())
                .collect();
            files.sort();
            Ok::<_, anyhow::Error>(files)
        })
        .await?
    }
}

/// Copies each source file to its mirrored destination path.
#[derive(Debug, Clone)]
pub struct CopyPipeline {
    source_root: PathBuf,
    dest_root: PathBuf,
}

impl CopyPipeline {
    pub fn new(source_root: impl Into<PathBuf>, dest_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            dest_root: dest_root.into(),
        }
    }
}

#[async_trait]
impl BuildPipeline for CopyPipeline {
    async fn process_build(&self, files: Vec<PathBuf>, _incremental: bool) -> anyhow::Result<()> {
        for file in files {
            let Some(dest) = source_to_dest(&file, &self.source_root, &self.dest_root) else {
                anyhow::bail!("{} is outside the source tree", file.display());
            };
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            tokio::fs::copy(&file, &dest)
                .await
                .with_context(|| format!("copying {} to {}", file.display(), dest.display()))?;
            debug!("Copied {} to {}", file.display(), dest.display());
        }
        Ok(())
    }
}

/// Removes a destination file or directory tree. A missing path is not an
/// error.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveCleaner;

#[async_trait]
impl Cleaner for RemoveCleaner {
    async fn process_clean(&self, dest_path: &Path, _incremental: bool) -> anyhow::Result<()> {
        let metadata = match tokio::fs::symlink_metadata(dest_path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Nothing to clean at {}", dest_path.display());
                return Ok(());
            }
            Err(e) => return Err(e).with_context(|| format!("inspecting {}", dest_path.display())),
        };

        let removed = if metadata.is_dir() {
            tokio::fs::remove_dir_all(dest_path).await
        } else {
            tokio::fs::remove_file(dest_path).await
        };
        removed.with_context(|| format!("removing {}", dest_path.display()))?;

        debug!("Removed {}", dest_path.display());
        Ok(())
    }
}
