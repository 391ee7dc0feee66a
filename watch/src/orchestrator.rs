//! Watch orchestrator: validates configuration, starts sessions and the
//! live-reload server, and wires session events to their consumers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use kiln_livereload::{ChangedFiles, LiveReloadCoordinator};
use kiln_watcher::{ChangeEvent, PathSpec, SessionEvents, SessionState, WatchSession};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::collaborators::Collaborators;
use crate::config::WatchConfig;
use crate::dispatcher::{BuildDispatcher, SourceHandler};
use crate::error::{Result, WatchError};

/// Which resources [`WatchOrchestrator::stop`] tears down.
///
/// The default selects nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopScope {
    pub source: bool,
    pub dest: bool,
    pub livereload: bool,
}

impl StopScope {
    /// Every resource.
    pub fn all() -> Self {
        Self {
            source: true,
            dest: true,
            livereload: true,
        }
    }

    pub fn source() -> Self {
        Self {
            source: true,
            ..Self::default()
        }
    }

    pub fn dest() -> Self {
        Self {
            dest: true,
            ..Self::default()
        }
    }

    pub fn livereload() -> Self {
        Self {
            livereload: true,
            ..Self::default()
        }
    }
}

/// Receivers waiting for their consumer loops to be spawned.
struct PendingListeners {
    source: SessionEvents,
    dest: SessionEvents,
}

/// Owns both watch sessions, the live-reload coordinator and the consumer
/// loops that connect them to the build pipeline.
///
/// Instances are independent: several orchestrators can run in one process.
pub struct WatchOrchestrator {
    config: WatchConfig,
    dispatcher: Arc<BuildDispatcher>,
    source: WatchSession,
    dest: WatchSession,
    coordinator: LiveReloadCoordinator,
    pending: Option<PendingListeners>,
}

impl WatchOrchestrator {
    pub fn new(config: WatchConfig, collaborators: Collaborators) -> Self {
        let dispatcher = Arc::new(BuildDispatcher::new(&config, collaborators));
        let (source, source_events) = WatchSession::new(config.source_session());
        let (dest, dest_events) = WatchSession::new(config.dest_session());
        let coordinator = LiveReloadCoordinator::new(config.livereload_config());

        Self {
            config,
            dispatcher,
            source,
            dest,
            coordinator,
            pending: Some(PendingListeners {
                source: source_events,
                dest: dest_events,
            }),
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Start watching.
    ///
    /// Resolves once the source session is ready and, with live-reload
    /// enabled, once the server is bound and the destination session is
    /// ready too. Nothing is bound when the configuration is rejected.
    pub async fn process_watch(
        &mut self,
        source_spec: impl Into<PathSpec>,
        dest_spec: impl Into<PathSpec>,
    ) -> Result<()> {
        if !self.config.options.watch {
            debug!("Watching disabled");
            return Ok(());
        }

        let started = Instant::now();

        self.config.validate_paths()?;

        let source_root = &self.config.paths.source;
        if !tokio::fs::try_exists(source_root).await.unwrap_or(false) {
            return Err(WatchError::MissingSourceDirectory(source_root.clone()));
        }

        info!("Watch");
        self.spawn_consumers();

        self.source.start(source_spec.into()).await?;

        if self.config.options.livereload {
            self.coordinator.stop_server().await;
            let addr = self.coordinator.start_server().await?;

            tokio::fs::create_dir_all(&self.config.paths.dest).await?;
            self.dest.start(dest_spec.into()).await?;

            info!("LiveReload listening on port {}", addr.port());
        }

        info!("Watch started in {} ms", started.elapsed().as_millis());
        Ok(())
    }

    /// Tear down the selected resources. Each one is stopped independently
    /// and stopping an idle resource is a no-op.
    pub async fn stop(&mut self, scope: StopScope) {
        if scope.source {
            self.source.stop();
        }
        if scope.dest {
            self.dest.stop();
        }
        if scope.livereload {
            self.coordinator.stop_server().await;
        }
    }

    /// Spawn the per-session consumer loops on first use.
    fn spawn_consumers(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        let source = SourceHandler::new(
            self.dispatcher.clone(),
            self.config.timing.quiet_window(),
            self.config.options.debug,
        );
        let batcher = self.coordinator.batcher(&self.config.paths.dest);

        // Each loop ends once its session's listener senders are gone.
        tokio::spawn(source.run(pending.source));
        tokio::spawn(batcher.run(pending.dest));
        debug!("Spawned session consumers");
    }

    /// Every source event, including suppressed repeats.
    pub fn source_events(&self) -> broadcast::Receiver<ChangeEvent> {
        self.source.subscribe()
    }

    /// Every destination event.
    pub fn dest_events(&self) -> broadcast::Receiver<ChangeEvent> {
        self.dest.subscribe()
    }

    pub fn source_state(&self) -> SessionState {
        self.source.state()
    }

    pub fn dest_state(&self) -> SessionState {
        self.dest.state()
    }

    pub fn source_session(&self) -> &WatchSession {
        &self.source
    }

    pub fn dest_session(&self) -> &WatchSession {
        &self.dest
    }

    pub fn is_listening(&self) -> bool {
        self.coordinator.is_listening()
    }

    /// Address of the live-reload server, when running.
    pub fn livereload_addr(&self) -> Option<SocketAddr> {
        self.coordinator.local_addr()
    }

    /// Batches received by the live-reload server, when running.
    pub fn reload_notices(&self) -> Option<broadcast::Receiver<ChangedFiles>> {
        self.coordinator.subscribe()
    }
}
