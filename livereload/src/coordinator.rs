//! Live-reload coordination: server lifecycle and change batching.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use kiln_watcher::{ChangeEvent, ChangeKind, SessionEvents};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::batch::PendingReloadBatch;
use crate::config::LiveReloadConfig;
use crate::error::Result;
use crate::notifier::{ChangedFiles, HttpNotifier, ReloadNotifier, push_address};
use crate::server::LiveReloadServer;
use crate::timer::{FlushTimer, fired};

/// Owns the notification server and hands out batchers that push to it.
pub struct LiveReloadCoordinator {
    config: LiveReloadConfig,
    server: Option<LiveReloadServer>,
    endpoint: watch::Sender<Option<SocketAddr>>,
}

impl LiveReloadCoordinator {
    /// Create a coordinator with no server running.
    pub fn new(config: LiveReloadConfig) -> Self {
        let (endpoint, _) = watch::channel(None);
        Self {
            config,
            server: None,
            endpoint,
        }
    }

    /// Live-reload configuration.
    pub fn config(&self) -> &LiveReloadConfig {
        &self.config
    }

    /// Bind a fresh server, closing any running one first.
    pub async fn start_server(&mut self) -> Result<SocketAddr> {
        self.stop_server().await;

        let server = LiveReloadServer::bind(self.config.bind_address()).await?;
        let addr = server.local_addr();
        self.endpoint.send_replace(Some(push_address(addr)));
        self.server = Some(server);

        Ok(addr)
    }

    /// Close the running server. No-op when none is running.
    pub async fn stop_server(&mut self) {
        if let Some(server) = self.server.take() {
            self.endpoint.send_replace(None);
            server.close().await;
        }
    }

    pub fn is_listening(&self) -> bool {
        self.server.is_some()
    }

    /// Address of the running server.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(LiveReloadServer::local_addr)
    }

    /// Batches received by the running server.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<ChangedFiles>> {
        self.server.as_ref().map(LiveReloadServer::subscribe)
    }

    /// Push address of the current server, `None` while stopped.
    pub fn endpoint(&self) -> watch::Receiver<Option<SocketAddr>> {
        self.endpoint.subscribe()
    }

    /// A batcher for `dest_root` that pushes to whichever server is running.
    pub fn batcher(&self, dest_root: impl Into<PathBuf>) -> ReloadBatcher {
        ReloadBatcher::new(
            dest_root,
            self.config.clone(),
            Arc::new(HttpNotifier::new(self.endpoint())),
        )
    }
}

/// Where a batcher is in its flush cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    /// Nothing pending.
    Idle,

    /// Changes collected, flush timer armed.
    PendingFlush,

    /// A push is in flight.
    Flushing,
}

/// Collects destination changes and pushes them in coalesced batches.
///
/// The first qualifying change arms the flush timer; later changes only
/// join the batch until it fires.
pub struct ReloadBatcher {
    dest_root: PathBuf,
    config: LiveReloadConfig,
    batch: PendingReloadBatch,
    timer: FlushTimer,
    notifier: Arc<dyn ReloadNotifier>,
    state: watch::Sender<ReloadState>,
}

impl ReloadBatcher {
    /// Batch changes under `dest_root` and hand each flush to `notifier`.
    pub fn new(
        dest_root: impl Into<PathBuf>,
        config: LiveReloadConfig,
        notifier: Arc<dyn ReloadNotifier>,
    ) -> Self {
        let timer = FlushTimer::new(config.flush_delay);
        let (state, _) = watch::channel(ReloadState::Idle);
        Self {
            dest_root: dest_root.into(),
            config,
            batch: PendingReloadBatch::new(),
            timer,
            notifier,
            state,
        }
    }

    /// Current batching state.
    pub fn state(&self) -> ReloadState {
        *self.state.borrow()
    }

    /// Watch batching state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ReloadState> {
        self.state.subscribe()
    }

    /// Files waiting for the next flush.
    pub fn pending(&self) -> &PendingReloadBatch {
        &self.batch
    }

    /// Apply one destination event.
    pub fn handle(&mut self, event: &ChangeEvent) {
        match event.kind {
            ChangeKind::Ready => self.reset(),
            ChangeKind::AddFile | ChangeKind::Change => self.record(event),
            ChangeKind::Error => {
                warn!(
                    "Destination watcher error: {}",
                    event.message.as_deref().unwrap_or("unknown")
                );
            }
            ChangeKind::AddDir | ChangeKind::Remove | ChangeKind::RemoveDir => {}
        }
    }

    fn record(&mut self, event: &ChangeEvent) {
        let eligible = event
            .extension()
            .is_some_and(|ext| self.config.is_eligible(&ext));
        if !eligible {
            return;
        }
        let Some(relative) = event.relative_to(&self.dest_root) else {
            debug!("Ignoring change outside destination: {}", event.path.display());
            return;
        };

        info!("{relative} {}", event.kind);
        self.batch.push(relative);

        if self.timer.arm_if_idle(event.observed_at) {
            self.state.send_replace(ReloadState::PendingFlush);
        }
    }

    fn reset(&mut self) {
        self.batch.clear();
        self.timer.disarm();
        self.state.send_replace(ReloadState::Idle);
    }

    /// Push the pending batch now. Returns the files pushed.
    ///
    /// The batch is cleared before the push, so a failed push is not
    /// retried; the next change starts a new batch.
    pub async fn flush(&mut self) -> Result<Vec<String>> {
        self.timer.disarm();
        let files = self.batch.take();
        if files.is_empty() {
            self.state.send_replace(ReloadState::Idle);
            return Ok(files);
        }

        self.state.send_replace(ReloadState::Flushing);
        let changes = ChangedFiles::new(files);
        let result = self.notifier.notify(&changes).await;
        self.state.send_replace(ReloadState::Idle);

        result?;
        info!("Live reload pushed {} file(s)", changes.files.len());
        Ok(changes.files)
    }

    /// Consume destination events until the session's listener closes.
    pub async fn run(mut self, mut events: SessionEvents) {
        loop {
            let deadline = self.timer.deadline();
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle(&event),
                    None => break,
                },
                () = fired(deadline) => self.flush_and_log().await,
            }
        }

        if !self.batch.is_empty() {
            self.flush_and_log().await;
        }
        debug!("Destination listener closed; reload batcher stopped");
    }

    async fn flush_and_log(&mut self) {
        if let Err(e) = self.flush().await {
            error!("Live reload push failed: {e}");
        }
    }
}
