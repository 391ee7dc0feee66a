//! Build dispatch for source-side changes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use kiln_watcher::{ChangeEvent, ChangeKind, DebounceGate, SessionEvents};
use tracing::{debug, error, info};

use crate::collaborators::Collaborators;
use crate::config::{IncludeConfig, WatchConfig};
use crate::error::{Result, WatchError};
use crate::paths::{file_extension, source_to_dest, trim_root};

/// Decides which files a source change rebuilds and drives the collaborators.
pub struct BuildDispatcher {
    source_root: PathBuf,
    dest_root: PathBuf,
    include: IncludeConfig,
    collaborators: Collaborators,
}

impl BuildDispatcher {
    pub fn new(config: &WatchConfig, collaborators: Collaborators) -> Self {
        Self {
            source_root: config.paths.source.clone(),
            dest_root: config.paths.dest.clone(),
            include: config.include.clone(),
            collaborators,
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Files that must be rebuilt because `path` was added or changed.
    ///
    /// An include with an embeddable extension pulls in every file of that
    /// extension under the source tree; any other include rebuilds nothing.
    pub async fn files_for_change(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if !self.include.is_include(&name) {
            return Ok(vec![path.to_path_buf()]);
        }

        match file_extension(path) {
            Some(ext) if self.include.is_embeddable(&ext) => {
                let pattern = format!(
                    "{}/**/*.{ext}",
                    self.source_root.display().to_string().trim_end_matches('/')
                );
                self.collaborators
                    .enumerator
                    .enumerate(&pattern)
                    .await
                    .map_err(WatchError::Enumerate)
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Submit the rebuild for an added or changed source file. Returns the
    /// submitted files; nothing is submitted when the set is empty.
    pub async fn on_source_change_like(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let files = self.files_for_change(path).await?;
        if files.is_empty() {
            debug!("Nothing to rebuild for {}", self.trim(path));
            return Ok(files);
        }

        self.collaborators
            .pipeline
            .process_build(files.clone(), true)
            .await
            .map_err(WatchError::Pipeline)?;
        Ok(files)
    }

    /// Create the destination counterpart of a new source directory.
    pub async fn mirror_directory(&self, path: &Path) -> Result<()> {
        let dest = self.dest_for(path)?;
        tokio::fs::create_dir_all(&dest).await?;
        Ok(())
    }

    /// Remove the destination counterpart of a removed source directory.
    pub async fn remove_mirrored(&self, path: &Path) -> Result<()> {
        self.clean(path).await
    }

    /// Remove the destination counterpart of a removed source file.
    pub async fn clean_file(&self, path: &Path) -> Result<()> {
        self.clean(path).await
    }

    async fn clean(&self, path: &Path) -> Result<()> {
        let dest = self.dest_for(path)?;
        self.collaborators
            .cleaner
            .process_clean(&dest, true)
            .await
            .map_err(WatchError::Cleanup)
    }

    fn dest_for(&self, path: &Path) -> Result<PathBuf> {
        source_to_dest(path, &self.source_root, &self.dest_root).ok_or_else(|| {
            WatchError::InvalidPaths(format!("{} is outside the source tree", path.display()))
        })
    }

    fn trim(&self, path: &Path) -> String {
        trim_root(path, &self.source_root)
    }
}

/// Consumes the source session's events in order, gating repeated changes.
pub struct SourceHandler {
    dispatcher: Arc<BuildDispatcher>,
    gate: DebounceGate,
    debug: bool,
}

impl SourceHandler {
    pub fn new(dispatcher: Arc<BuildDispatcher>, quiet_window: Duration, debug: bool) -> Self {
        Self {
            dispatcher,
            gate: DebounceGate::new(quiet_window),
            debug,
        }
    }

    /// Apply one source event. Collaborator failures are returned; they
    /// never end the event loop.
    pub async fn handle(&mut self, event: &ChangeEvent) -> Result<()> {
        let dispatcher = &self.dispatcher;
        let path = event.path.as_path();

        match event.kind {
            ChangeKind::Ready => {
                self.gate.reset();
                Ok(())
            }
            ChangeKind::AddDir => {
                info!("{} {}", dispatcher.trim(path), event.kind);
                dispatcher.mirror_directory(path).await
            }
            ChangeKind::RemoveDir => {
                info!("{} {}", dispatcher.trim(path), event.kind);
                dispatcher.remove_mirrored(path).await
            }
            ChangeKind::AddFile => {
                info!("{} {}", dispatcher.trim(path), event.kind);
                dispatcher.on_source_change_like(path).await.map(|_| ())
            }
            ChangeKind::Change => {
                if self.gate.should_process(path, event.observed_at) {
                    info!("{} {}", dispatcher.trim(path), event.kind);
                    dispatcher.on_source_change_like(path).await.map(|_| ())
                } else {
                    if self.debug {
                        debug!("{} changed too recently, skipping", dispatcher.trim(path));
                    }
                    Ok(())
                }
            }
            ChangeKind::Remove => {
                info!("{} {}", dispatcher.trim(path), event.kind);
                dispatcher.clean_file(path).await
            }
            ChangeKind::Error => {
                error!(
                    "Error watching source: {}",
                    event.message.as_deref().unwrap_or("unknown")
                );
                Ok(())
            }
        }
    }

    /// Consume events until the session's listener closes.
    pub async fn run(mut self, mut events: SessionEvents) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle(&event).await {
                error!("Failed to handle {} for {}: {e}", event.kind, event.path.display());
            }
        }
        debug!("Source listener closed; dispatcher stopped");
    }
}
