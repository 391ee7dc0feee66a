//! # Live-reload
//!
//! Coalesced browser reload notifications for the Kiln watch engine.
//!
//! ## Features
//!
//! - **Batching**: destination changes inside one quiet window become one push
//! - **Push protocol**: `POST /changed` with `{"files": [...]}`
//! - **Notification server**: rebroadcasts pushes to `GET /events` clients
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Live-Reload Coordinator                      │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ChangeEvent ──► ReloadBatcher ──► HttpNotifier ──► /changed    │
//! │                    │       │                           │        │
//! │                    ▼       ▼                           ▼        │
//! │        PendingReloadBatch  FlushTimer        LiveReloadServer   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod batch;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod notifier;
pub mod server;
pub mod timer;

pub use batch::PendingReloadBatch;
pub use config::{DEFAULT_PORT, LiveReloadConfig, default_file_types};
pub use coordinator::{LiveReloadCoordinator, ReloadBatcher, ReloadState};
pub use error::{LiveReloadError, Result};
pub use notifier::{
    CHANGED_PATH, ChangedFiles, DEFAULT_PUSH_TIMEOUT, HttpNotifier, ReloadNotifier, push_address,
};
pub use server::LiveReloadServer;
pub use timer::{DEFAULT_FLUSH_DELAY, FlushTimer};
