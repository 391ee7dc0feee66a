//! Translation of raw notify events into session change events.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use notify::event::{CreateKind, MetadataKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};
use walkdir::WalkDir;

use crate::config::SessionConfig;
use crate::event::{ChangeEvent, ChangeKind, SessionRole};
use crate::target::{TreeSnapshot, WatchTarget};

/// Turns notify events into `ChangeEvent`s for one bound target.
///
/// Keeps the set of known directories and files so removals and renames can
/// be classified after the path is gone.
#[derive(Debug)]
pub struct EventTranslator {
    config: SessionConfig,
    target: WatchTarget,
    dirs: HashSet<PathBuf>,
    files: HashSet<PathBuf>,
}

impl EventTranslator {
    /// Create a translator seeded with the tree as it was at bind time.
    pub fn new(config: SessionConfig, target: WatchTarget, snapshot: TreeSnapshot) -> Self {
        Self {
            config,
            target,
            dirs: snapshot.dirs,
            files: snapshot.files,
        }
    }

    /// Role of the session this translator belongs to.
    pub fn role(&self) -> SessionRole {
        self.config.role
    }

    /// Translate one notify event. May yield zero or several change events.
    pub fn translate(&mut self, event: Event) -> Vec<ChangeEvent> {
        let mut out = Vec::new();
        let paths = event.paths;

        match event.kind {
            EventKind::Create(CreateKind::Folder) => {
                for path in paths {
                    self.appeared(path, Some(true), &mut out);
                }
            }
            EventKind::Create(CreateKind::File) => {
                for path in paths {
                    self.appeared(path, Some(false), &mut out);
                }
            }
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                for path in paths {
                    self.appeared(path, None, &mut out);
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                for path in paths {
                    self.vanished(path, None, &mut out);
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let mut paths = paths.into_iter();
                if let (Some(from), Some(to)) = (paths.next(), paths.next()) {
                    self.vanished(from, None, &mut out);
                    self.appeared(to, None, &mut out);
                }
            }
            EventKind::Modify(ModifyKind::Name(_)) => {
                for path in paths {
                    if path.exists() {
                        self.appeared(path, None, &mut out);
                    } else {
                        self.vanished(path, None, &mut out);
                    }
                }
            }
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => {}
            EventKind::Modify(_) => {
                for path in paths {
                    self.changed(path, &mut out);
                }
            }
            EventKind::Remove(RemoveKind::Folder) => {
                for path in paths {
                    self.vanished(path, Some(true), &mut out);
                }
            }
            EventKind::Remove(RemoveKind::File) => {
                for path in paths {
                    self.vanished(path, Some(false), &mut out);
                }
            }
            EventKind::Remove(_) => {
                for path in paths {
                    self.vanished(path, None, &mut out);
                }
            }
            EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
        }

        out
    }

    fn appeared(&mut self, path: PathBuf, is_dir: Option<bool>, out: &mut Vec<ChangeEvent>) {
        let created_file = is_dir == Some(false);
        let is_dir = is_dir.unwrap_or_else(|| path.is_dir());
        if is_dir {
            if self.dirs.insert(path.clone()) {
                self.push(ChangeKind::AddDir, path.clone(), out);
                self.populated(&path, out);
            }
        } else if self.files.insert(path.clone()) {
            self.push(ChangeKind::AddFile, path, out);
        } else if !created_file {
            // Replaced in place, e.g. an atomic save renaming over the file.
            self.push(ChangeKind::Change, path, out);
        }
    }

    /// Report what a newly appeared directory already contains. A directory
    /// moved into the tree arrives as a single notification.
    fn populated(&mut self, dir: &Path, out: &mut Vec<ChangeEvent>) {
        let entries = WalkDir::new(dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok());

        for entry in entries {
            let is_dir = entry.file_type().is_dir();
            let path = entry.into_path();
            if is_dir {
                if self.dirs.insert(path.clone()) {
                    self.push(ChangeKind::AddDir, path, out);
                }
            } else if self.files.insert(path.clone()) {
                self.push(ChangeKind::AddFile, path, out);
            }
        }
    }

    fn vanished(&mut self, path: PathBuf, is_dir: Option<bool>, out: &mut Vec<ChangeEvent>) {
        let was_dir = self.dirs.remove(&path) || (is_dir == Some(true) && !self.files.contains(&path));
        if was_dir {
            self.dirs.retain(|d| !d.starts_with(&path));
            self.files.retain(|f| !f.starts_with(&path));
            self.push(ChangeKind::RemoveDir, path, out);
        } else {
            self.files.remove(&path);
            self.push(ChangeKind::Remove, path, out);
        }
    }

    fn changed(&mut self, path: PathBuf, out: &mut Vec<ChangeEvent>) {
        if self.dirs.contains(&path) || path.is_dir() {
            return;
        }
        self.files.insert(path.clone());
        self.push(ChangeKind::Change, path, out);
    }

    fn push(&self, kind: ChangeKind, path: PathBuf, out: &mut Vec<ChangeEvent>) {
        if self.accepts(&path, kind.is_directory()) {
            out.push(ChangeEvent::new(self.config.role, kind, path));
        }
    }

    fn accepts(&self, path: &Path, is_dir: bool) -> bool {
        !self.config.should_exclude(path) && self.target.matches(path, is_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::PathSpec;
    use pretty_assertions::assert_eq;

    fn translator(glob: &str, snapshot: TreeSnapshot) -> EventTranslator {
        let config = SessionConfig::new(SessionRole::Source, "/site/source");
        let target = PathSpec::Default.resolve(&config.root, glob).unwrap();
        EventTranslator::new(config, target, snapshot)
    }

    fn kinds(events: &[ChangeEvent]) -> Vec<(ChangeKind, PathBuf)> {
        events.iter().map(|e| (e.kind, e.path.clone())).collect()
    }

    #[test]
    fn test_create_file_and_folder() {
        let mut t = translator("", TreeSnapshot::default());

        let file = t.translate(
            Event::new(EventKind::Create(CreateKind::File)).add_path("/site/source/a.html".into()),
        );
        let dir = t.translate(
            Event::new(EventKind::Create(CreateKind::Folder)).add_path("/site/source/blog".into()),
        );

        assert_eq!(
            kinds(&file),
            vec![(ChangeKind::AddFile, PathBuf::from("/site/source/a.html"))]
        );
        assert_eq!(
            kinds(&dir),
            vec![(ChangeKind::AddDir, PathBuf::from("/site/source/blog"))]
        );
    }

    #[test]
    fn test_data_modification_is_a_change() {
        let mut t = translator("", TreeSnapshot::default());
        let events = t.translate(
            Event::new(EventKind::Modify(ModifyKind::Any)).add_path("/site/source/app.css".into()),
        );
        assert_eq!(
            kinds(&events),
            vec![(ChangeKind::Change, PathBuf::from("/site/source/app.css"))]
        );
    }

    #[test]
    fn test_access_events_are_ignored() {
        let mut t = translator("", TreeSnapshot::default());
        let events = t.translate(
            Event::new(EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)))
                .add_path("/site/source/app.css".into()),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_removal_of_known_directory_is_remove_dir() {
        let mut snapshot = TreeSnapshot::default();
        snapshot.dirs.insert(PathBuf::from("/site/source/blog"));
        snapshot.files.insert(PathBuf::from("/site/source/blog/post.html"));
        let mut t = translator("", snapshot);

        let events = t.translate(
            Event::new(EventKind::Remove(RemoveKind::Any)).add_path("/site/source/blog".into()),
        );

        assert_eq!(
            kinds(&events),
            vec![(ChangeKind::RemoveDir, PathBuf::from("/site/source/blog"))]
        );
    }

    #[test]
    fn test_rename_over_known_file_is_a_change() {
        let mut snapshot = TreeSnapshot::default();
        snapshot.files.insert(PathBuf::from("/site/source/app.css"));
        let mut t = translator("", snapshot);

        let events = t.translate(
            Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
                .add_path("/site/source/.app.css.tmp".into())
                .add_path("/site/source/app.css".into()),
        );

        assert_eq!(
            kinds(&events),
            vec![
                (ChangeKind::Remove, PathBuf::from("/site/source/.app.css.tmp")),
                (ChangeKind::Change, PathBuf::from("/site/source/app.css")),
            ]
        );
    }

    #[test]
    fn test_events_outside_target_are_dropped() {
        let mut t = translator("**/*.css", TreeSnapshot::default());
        let events = t.translate(
            Event::new(EventKind::Create(CreateKind::File))
                .add_path("/site/source/index.html".into())
                .add_path("/site/source/app.css".into()),
        );
        assert_eq!(
            kinds(&events),
            vec![(ChangeKind::AddFile, PathBuf::from("/site/source/app.css"))]
        );
    }

    #[test]
    fn test_directory_moved_in_reports_its_contents() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        std::fs::create_dir_all(root.join("blog/2024")).unwrap();
        std::fs::write(root.join("blog/post.html"), "<p>hi</p>").unwrap();
        std::fs::write(root.join("blog/2024/recap.html"), "<p>recap</p>").unwrap();

        let config = SessionConfig::new(SessionRole::Source, &root);
        let target = PathSpec::Default.resolve(&config.root, "").unwrap();
        let mut t = EventTranslator::new(config, target, TreeSnapshot::default());

        let events = t.translate(
            Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
                .add_path(root.join("blog")),
        );

        assert_eq!(
            kinds(&events),
            vec![
                (ChangeKind::AddDir, root.join("blog")),
                (ChangeKind::AddDir, root.join("blog/2024")),
                (ChangeKind::AddFile, root.join("blog/2024/recap.html")),
                (ChangeKind::AddFile, root.join("blog/post.html")),
            ]
        );

        // The watcher catching up on a file already reported adds nothing.
        let repeat = t.translate(
            Event::new(EventKind::Create(CreateKind::File)).add_path(root.join("blog/post.html")),
        );
        assert!(repeat.is_empty());
    }

    #[test]
    fn test_editor_swap_files_are_dropped() {
        let mut t = translator("", TreeSnapshot::default());
        let events = t.translate(
            Event::new(EventKind::Create(CreateKind::File))
                .add_path("/site/source/.index.html.swp".into()),
        );
        assert!(events.is_empty());
    }
}
