//! # Watcher
//!
//! Watch sessions for the Kiln rebuild engine. A session binds one tree
//! (source or destination) to a filesystem watcher and turns raw
//! notifications into typed change events.
//!
//! ## Features
//!
//! - **Replace-not-merge binding**: starting a session unbinds its previous watcher
//! - **Readiness**: `start` resolves once events are flowing, with an optional grace delay
//! - **Two event surfaces**: one internal listener channel, plus a public broadcast
//! - **Quiet window**: `DebounceGate` suppresses repeated change notifications
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Watch Session                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  PathSpec ──► WatchTarget ──► notify ──► EventTranslator        │
//! │                                              │                  │
//! │                                              ▼                  │
//! │                              ChangeEvent ──► listener channel   │
//! │                                          └─► EventEmitter       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod debounce;
pub mod emitter;
pub mod error;
pub mod event;
pub mod session;
pub mod target;
pub mod translate;

pub use config::{DEFAULT_READY_GRACE, SessionConfig};
pub use debounce::{DEFAULT_QUIET_WINDOW, DebounceGate};
pub use emitter::EventEmitter;
pub use error::{Result, WatcherError};
pub use event::{ChangeEvent, ChangeKind, SessionRole, relative_slash_path};
pub use session::{SessionEvents, SessionState, WatchSession};
pub use target::{PathSpec, TreeSnapshot, WatchRoot, WatchTarget};
pub use translate::EventTranslator;
