use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kiln_watch::{
    BuildPipeline, Cleaner, Collaborators, PathSpec, StopScope, WatchConfig, WatchError,
    WatchOrchestrator,
};
use kiln_watcher::{ChangeKind, SessionState};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

struct RecordingPipeline {
    builds: mpsc::UnboundedSender<Vec<PathBuf>>,
}

#[async_trait]
impl BuildPipeline for RecordingPipeline {
    async fn process_build(&self, files: Vec<PathBuf>, _incremental: bool) -> anyhow::Result<()> {
        let _ = self.builds.send(files);
        Ok(())
    }
}

struct RecordingCleaner {
    cleans: mpsc::UnboundedSender<PathBuf>,
}

#[async_trait]
impl Cleaner for RecordingCleaner {
    async fn process_clean(&self, dest_path: &Path, _incremental: bool) -> anyhow::Result<()> {
        let _ = self.cleans.send(dest_path.to_path_buf());
        Ok(())
    }
}

struct Site {
    _dir: TempDir,
    source: PathBuf,
    dest: PathBuf,
}

impl Site {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let source = root.join("source");
        let dest = root.join("dest");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::create_dir_all(&dest).unwrap();
        Self {
            _dir: dir,
            source,
            dest,
        }
    }

    fn config(&self) -> WatchConfig {
        WatchConfig::new(&self.source, &self.dest)
            .with_interactive(true)
            .with_host("127.0.0.1".parse().unwrap())
            .with_port(0)
    }
}

struct Harness {
    orchestrator: WatchOrchestrator,
    builds: mpsc::UnboundedReceiver<Vec<PathBuf>>,
    cleans: mpsc::UnboundedReceiver<PathBuf>,
}

fn harness(config: WatchConfig) -> Harness {
    let (build_tx, builds) = mpsc::unbounded_channel();
    let (clean_tx, cleans) = mpsc::unbounded_channel();
    let collaborators = Collaborators::new(
        Arc::new(RecordingPipeline { builds: build_tx }),
        Arc::new(RecordingCleaner { cleans: clean_tx }),
    );
    Harness {
        orchestrator: WatchOrchestrator::new(config, collaborators),
        builds,
        cleans,
    }
}

#[tokio::test]
async fn test_missing_source_directory_binds_nothing() {
    let site = Site::new();
    std::fs::remove_dir(&site.source).unwrap();
    let mut h = harness(site.config());

    let result = h.orchestrator.process_watch(PathSpec::Default, PathSpec::Default).await;

    assert!(matches!(result, Err(WatchError::MissingSourceDirectory(_))));
    assert!(result.unwrap_err().to_string().contains("missing source directory"));
    assert_eq!(h.orchestrator.source_state(), SessionState::Stopped);
    assert!(!h.orchestrator.source_session().is_bound());
    assert!(!h.orchestrator.is_listening());
}

#[tokio::test]
async fn test_invalid_paths_are_rejected_before_binding() {
    let site = Site::new();
    let config = WatchConfig::new(&site.source, site.source.join("out")).with_interactive(true);
    let mut h = harness(config);

    let result = h.orchestrator.process_watch(PathSpec::Default, PathSpec::Default).await;

    assert!(matches!(result, Err(WatchError::InvalidPaths(_))));
    assert!(!h.orchestrator.source_session().is_bound());
}

#[tokio::test]
async fn test_disabled_watch_does_nothing() {
    let site = Site::new();
    let mut h = harness(site.config().with_watch(false));

    h.orchestrator
        .process_watch(PathSpec::Default, PathSpec::Default)
        .await
        .unwrap();

    assert_eq!(h.orchestrator.source_state(), SessionState::Stopped);
    assert!(!h.orchestrator.is_listening());
}

#[tokio::test]
async fn test_livereload_disabled_watches_source_only() {
    let site = Site::new();
    let mut h = harness(site.config().with_livereload(false));

    h.orchestrator
        .process_watch(PathSpec::Default, PathSpec::Default)
        .await
        .unwrap();

    assert_eq!(h.orchestrator.source_state(), SessionState::Ready);
    assert_eq!(h.orchestrator.dest_state(), SessionState::Stopped);
    assert!(!h.orchestrator.is_listening());
}

#[tokio::test]
async fn test_new_source_file_is_built() {
    let site = Site::new();
    let mut h = harness(site.config().with_livereload(false));
    h.orchestrator
        .process_watch(PathSpec::Default, PathSpec::Default)
        .await
        .unwrap();

    let page = site.source.join("index.html");
    std::fs::write(&page, "<h1>hi</h1>").unwrap();

    let built = timeout(EVENT_TIMEOUT, h.builds.recv()).await.unwrap().unwrap();
    assert_eq!(built, vec![page]);
}

#[tokio::test]
async fn test_changed_include_rebuilds_its_type() {
    let site = Site::new();
    std::fs::create_dir_all(site.source.join("css")).unwrap();
    for file in ["_vars.css", "app.css", "css/print.css"] {
        std::fs::write(site.source.join(file), "body{}").unwrap();
    }
    std::fs::write(site.source.join("index.html"), "").unwrap();

    let mut h = harness(site.config().with_livereload(false));
    h.orchestrator
        .process_watch(PathSpec::Default, PathSpec::Default)
        .await
        .unwrap();

    std::fs::write(site.source.join("_vars.css"), ":root{}").unwrap();

    let built = timeout(EVENT_TIMEOUT, h.builds.recv()).await.unwrap().unwrap();
    assert_eq!(
        built,
        vec![
            site.source.join("_vars.css"),
            site.source.join("app.css"),
            site.source.join("css/print.css"),
        ]
    );
}

#[tokio::test]
async fn test_rapid_double_change_builds_once() {
    let site = Site::new();
    let stylesheet = site.source.join("app.css");
    std::fs::write(&stylesheet, "body{}").unwrap();

    let mut h = harness(site.config().with_livereload(false));
    h.orchestrator
        .process_watch(PathSpec::Default, PathSpec::Default)
        .await
        .unwrap();

    std::fs::write(&stylesheet, "body{color:red}").unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    std::fs::write(&stylesheet, "body{color:blue}").unwrap();

    let built = timeout(EVENT_TIMEOUT, h.builds.recv()).await.unwrap().unwrap();
    assert_eq!(built, vec![stylesheet]);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(h.builds.try_recv().is_err());
}

#[tokio::test]
async fn test_removed_source_file_is_cleaned() {
    let site = Site::new();
    std::fs::write(site.source.join("old.html"), "").unwrap();

    let mut h = harness(site.config().with_livereload(false));
    h.orchestrator
        .process_watch(PathSpec::Default, PathSpec::Default)
        .await
        .unwrap();

    std::fs::remove_file(site.source.join("old.html")).unwrap();

    let cleaned = timeout(EVENT_TIMEOUT, h.cleans.recv()).await.unwrap().unwrap();
    assert_eq!(cleaned, site.dest.join("old.html"));
}

#[tokio::test]
async fn test_new_source_directory_is_mirrored() {
    let site = Site::new();
    let mut h = harness(site.config().with_livereload(false));
    let mut events = h.orchestrator.source_events();
    h.orchestrator
        .process_watch(PathSpec::Default, PathSpec::Default)
        .await
        .unwrap();

    std::fs::create_dir(site.source.join("blog")).unwrap();

    timeout(EVENT_TIMEOUT, async {
        loop {
            let event = events.recv().await.unwrap();
            if event.kind == ChangeKind::AddDir {
                break;
            }
        }
    })
    .await
    .unwrap();

    timeout(EVENT_TIMEOUT, async {
        while !site.dest.join("blog").is_dir() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_directory_moved_into_source_builds_its_files() {
    let site = Site::new();
    let staging = site.source.parent().unwrap().join("staging");
    std::fs::create_dir_all(staging.join("blog")).unwrap();
    std::fs::write(staging.join("blog/post.html"), "<p>post</p>").unwrap();

    let mut h = harness(site.config().with_livereload(false));
    h.orchestrator
        .process_watch(PathSpec::Default, PathSpec::Default)
        .await
        .unwrap();

    std::fs::rename(staging.join("blog"), site.source.join("blog")).unwrap();

    let built = timeout(EVENT_TIMEOUT, h.builds.recv()).await.unwrap().unwrap();
    assert_eq!(built, vec![site.source.join("blog/post.html")]);
}

#[tokio::test]
async fn test_port_in_use_fails_after_source_is_bound() {
    let site = Site::new();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();
    let mut h = harness(site.config().with_port(port));

    let result = h.orchestrator.process_watch(PathSpec::Default, PathSpec::Default).await;

    assert!(matches!(result, Err(WatchError::LiveReload(_))));
    assert_eq!(h.orchestrator.source_state(), SessionState::Ready);
    assert_eq!(h.orchestrator.dest_state(), SessionState::Stopped);
    assert!(!h.orchestrator.is_listening());
}

#[tokio::test]
async fn test_destination_changes_are_pushed_in_one_batch() {
    let site = Site::new();
    let mut h = harness(site.config());
    h.orchestrator
        .process_watch(PathSpec::Default, PathSpec::Default)
        .await
        .unwrap();

    assert!(h.orchestrator.is_listening());
    assert_eq!(h.orchestrator.dest_state(), SessionState::Ready);
    let mut notices = h.orchestrator.reload_notices().unwrap();

    std::fs::write(site.dest.join("index.html"), "").unwrap();
    std::fs::write(site.dest.join("app.css"), "").unwrap();
    std::fs::write(site.dest.join("notes.txt"), "").unwrap();

    let notice = timeout(EVENT_TIMEOUT, notices.recv()).await.unwrap().unwrap();
    assert_eq!(notice.files, vec!["index.html", "app.css"]);
}

#[tokio::test]
async fn test_stop_scopes_are_independent() {
    let site = Site::new();
    let mut h = harness(site.config());
    h.orchestrator
        .process_watch(PathSpec::Default, PathSpec::Default)
        .await
        .unwrap();

    h.orchestrator.stop(StopScope::default()).await;
    assert_eq!(h.orchestrator.source_state(), SessionState::Ready);
    assert_eq!(h.orchestrator.dest_state(), SessionState::Ready);
    assert!(h.orchestrator.is_listening());

    let mut dest_events = h.orchestrator.dest_events();
    h.orchestrator.stop(StopScope::source()).await;
    h.orchestrator.stop(StopScope::source()).await;

    assert_eq!(h.orchestrator.source_state(), SessionState::Stopped);
    assert_eq!(h.orchestrator.dest_state(), SessionState::Ready);
    assert!(h.orchestrator.is_listening());

    std::fs::write(site.dest.join("app.js"), "").unwrap();
    let event = timeout(EVENT_TIMEOUT, dest_events.recv()).await.unwrap().unwrap();
    assert_eq!(event.path, site.dest.join("app.js"));

    h.orchestrator.stop(StopScope::all()).await;
    assert_eq!(h.orchestrator.dest_state(), SessionState::Stopped);
    assert!(!h.orchestrator.is_listening());
}

#[tokio::test]
async fn test_restart_rebinds_everything() {
    let site = Site::new();
    let mut h = harness(site.config());

    h.orchestrator
        .process_watch(PathSpec::Default, PathSpec::Default)
        .await
        .unwrap();
    h.orchestrator
        .process_watch(PathSpec::from("**/*.html"), PathSpec::from("**/*.css"))
        .await
        .unwrap();

    assert_eq!(h.orchestrator.source_state(), SessionState::Ready);
    assert_eq!(h.orchestrator.dest_state(), SessionState::Ready);
    assert!(h.orchestrator.is_listening());
    assert_eq!(
        h.orchestrator.dest_session().target().unwrap().to_string(),
        format!("{}/**/*.css", site.dest.display())
    );
}
