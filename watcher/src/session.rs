//! Watch session: one logical watch binding with its own lifecycle.

use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::emitter::EventEmitter;
use crate::error::{Result, WatcherError};
use crate::event::{ChangeEvent, SessionRole};
use crate::target::{PathSpec, WatchTarget};
use crate::translate::EventTranslator;

const CHANNEL_CAPACITY: usize = 1000;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No watcher is bound.
    Stopped,

    /// A watcher is being bound.
    Starting,

    /// The watcher is delivering events.
    Ready,

    /// The watcher reported an error.
    Errored,
}

/// Receiving half of a session's internal listener channel.
pub type SessionEvents = mpsc::Receiver<ChangeEvent>;

enum RawSignal {
    Notify(notify::Result<notify::Event>),
    Ready,
}

struct Binding {
    watcher: RecommendedWatcher,
    target: WatchTarget,
    pump: JoinHandle<()>,
}

/// Binds one tree (source or destination) to an underlying watcher.
///
/// At most one watcher is bound at a time: `start` replaces the previous
/// binding instead of merging with it.
pub struct WatchSession {
    /// Session configuration.
    config: SessionConfig,

    /// Current binding, `None` when stopped.
    binding: Option<Binding>,

    /// Internal listener.
    listener: mpsc::Sender<ChangeEvent>,

    /// Public event surface.
    emitter: EventEmitter,

    /// Lifecycle state.
    state: Arc<watch::Sender<SessionState>>,
}

impl WatchSession {
    /// Create a stopped session and the receiver for its internal listener.
    pub fn new(config: SessionConfig) -> (Self, SessionEvents) {
        let (listener, events) = mpsc::channel(CHANNEL_CAPACITY);
        let (state, _) = watch::channel(SessionState::Stopped);

        let session = Self {
            config,
            binding: None,
            listener,
            emitter: EventEmitter::new(),
            state: Arc::new(state),
        };

        (session, events)
    }

    /// Which tree this session watches.
    pub fn role(&self) -> SessionRole {
        self.config.role
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Subscribe to the public event surface.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.emitter.subscribe()
    }

    /// Whether an underlying watcher is currently bound.
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// The target of the current binding.
    pub fn target(&self) -> Option<&WatchTarget> {
        self.binding.as_ref().map(|b| &b.target)
    }

    /// Bind a watcher to `spec`, replacing any previous binding.
    ///
    /// Resolves once the watcher is ready, plus the configured grace delay
    /// for non-interactive callers. Fails if the watcher reports an error
    /// first.
    pub async fn start(&mut self, spec: PathSpec) -> Result<()> {
        let role = self.config.role;
        self.stop();

        let target = match spec.resolve(&self.config.root, &self.config.default_glob) {
            Ok(target) => target,
            Err(e) => return Err(self.fail(e)),
        };

        self.state.send_replace(SessionState::Starting);
        debug!("Binding {role} watcher to {target}");

        let (raw_tx, raw_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let callback_tx = raw_tx.clone();
        let mut watcher = match notify::recommended_watcher(
            move |res: notify::Result<notify::Event>| {
                if let Err(e) = callback_tx.blocking_send(RawSignal::Notify(res)) {
                    debug!("Dropping watch notification after unbind: {e}");
                }
            },
        ) {
            Ok(watcher) => watcher,
            Err(e) => return Err(self.fail(e.into())),
        };

        for root in target.roots() {
            let mode = if root.recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };

            if let Err(e) = watcher.watch(&root.path, mode) {
                let err = if root.path.exists() {
                    WatcherError::from(e)
                } else {
                    WatcherError::RootNotFound(root.path.display().to_string())
                };
                return Err(self.fail(err));
            }
        }

        let snapshot = target.scan();
        let translator = EventTranslator::new(self.config.clone(), target.clone(), snapshot);
        let pump = tokio::spawn(pump(
            translator,
            raw_rx,
            self.listener.clone(),
            self.emitter.clone(),
            self.state.clone(),
        ));

        // Queued behind anything the watcher reported while binding.
        if raw_tx.send(RawSignal::Ready).await.is_err() {
            pump.abort();
            return Err(self.fail(WatcherError::Interrupted(role)));
        }

        self.binding = Some(Binding {
            watcher,
            target,
            pump,
        });

        self.wait_until_ready().await
    }

    async fn wait_until_ready(&self) -> Result<()> {
        let role = self.config.role;
        let mut state_rx = self.state.subscribe();

        let reached = state_rx
            .wait_for(|s| *s != SessionState::Starting)
            .await
            .map(|s| *s);

        match reached {
            Ok(SessionState::Ready) => {}
            Ok(SessionState::Errored) => {
                return Err(WatcherError::NotReady(role, "watcher reported an error".to_string()));
            }
            _ => return Err(WatcherError::Interrupted(role)),
        }

        let grace = self.config.effective_grace();
        if !grace.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(grace) => {}
                left_ready = async {
                    state_rx.wait_for(|s| *s != SessionState::Ready).await.map(|s| *s)
                } => {
                    return match left_ready {
                        Ok(SessionState::Errored) => Err(WatcherError::NotReady(
                            role,
                            "watcher reported an error".to_string(),
                        )),
                        _ => Err(WatcherError::Interrupted(role)),
                    };
                }
            }
        }

        if let Some(binding) = &self.binding {
            info!("Watching {role} at {}", binding.target);
        }
        Ok(())
    }

    /// Unbind the current watcher. No-op when nothing is bound.
    ///
    /// Events already handed to the internal listener are still delivered;
    /// work they started is not cancelled.
    pub fn stop(&mut self) {
        let Some(mut binding) = self.binding.take() else {
            return;
        };

        for root in binding.target.roots() {
            if let Err(e) = binding.watcher.unwatch(&root.path) {
                debug!("Unwatch of {} failed: {e}", root.path.display());
            }
        }
        binding.pump.abort();
        drop(binding.watcher);

        self.state.send_replace(SessionState::Stopped);
        info!("Stopped watching {}", self.config.role);
    }

    /// Record a binding failure and report it on both event surfaces.
    fn fail(&self, err: WatcherError) -> WatcherError {
        let role = self.config.role;
        error!("Error watching {role}: {err}");

        self.state.send_replace(SessionState::Errored);
        let event = ChangeEvent::error(role, err.to_string());
        self.emitter.emit(event.clone());
        if let Err(e) = self.listener.try_send(event) {
            warn!("Failed to queue {role} error event: {e}");
        }

        err
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Single event stream for one binding: translates notify events and hands
/// them, in order, to the internal listener and the public emitter.
async fn pump(
    mut translator: EventTranslator,
    mut raw_rx: mpsc::Receiver<RawSignal>,
    listener: mpsc::Sender<ChangeEvent>,
    emitter: EventEmitter,
    state: Arc<watch::Sender<SessionState>>,
) {
    while let Some(signal) = raw_rx.recv().await {
        let events = match signal {
            RawSignal::Ready => {
                state.send_if_modified(|s| {
                    if *s == SessionState::Starting {
                        *s = SessionState::Ready;
                        true
                    } else {
                        false
                    }
                });
                vec![ChangeEvent::ready(translator.role())]
            }
            RawSignal::Notify(Ok(event)) => translator.translate(event),
            RawSignal::Notify(Err(e)) => {
                let role = translator.role();
                error!("Error watching {role}: {e}");
                state.send_replace(SessionState::Errored);
                vec![ChangeEvent::error(role, e.to_string())]
            }
        };

        for event in events {
            emitter.emit(event.clone());
            if listener.send(event).await.is_err() {
                debug!("Session listener closed; ending event pump");
                return;
            }
        }
    }
}
