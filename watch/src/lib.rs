//! # Watch
//!
//! Change detection and incremental rebuild orchestration for Kiln.
//!
//! The orchestrator watches the source tree and hands each change to the
//! build dispatcher. With live-reload enabled it also serves reload
//! notifications and watches the destination tree, pushing coalesced
//! batches of changed files to connected browsers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Watch Orchestrator                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  source session ──► SourceHandler ──► BuildDispatcher           │
//! │                       (debounce)        │          │            │
//! │                                         ▼          ▼            │
//! │                               BuildPipeline     Cleaner         │
//! │                                                                 │
//! │  dest session ───► ReloadBatcher ──► LiveReloadServer           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use kiln_watch::{Collaborators, CopyPipeline, PathSpec, RemoveCleaner, WatchConfig, WatchOrchestrator};
//!
//! let config = WatchConfig::load("kiln.toml")?;
//! let pipeline = CopyPipeline::new(&config.paths.source, &config.paths.dest);
//! let collaborators = Collaborators::new(Arc::new(pipeline), Arc::new(RemoveCleaner));
//!
//! let mut orchestrator = WatchOrchestrator::new(config, collaborators);
//! orchestrator.process_watch(PathSpec::Default, PathSpec::Default).await?;
//! ```

pub mod collaborators;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod orchestrator;
pub mod paths;

pub use collaborators::{
    BuildPipeline, Cleaner, Collaborators, CopyPipeline, FileEnumerator, GlobEnumerator,
    RemoveCleaner,
};
pub use config::{
    GlobConfig, IncludeConfig, LiveReloadSection, OptionsConfig, PathsConfig, TimingConfig,
    WatchConfig,
};
pub use dispatcher::{BuildDispatcher, SourceHandler};
pub use error::{Result, WatchError};
pub use orchestrator::{StopScope, WatchOrchestrator};
pub use paths::{file_extension, source_to_dest, trim_root};

pub use kiln_watcher::PathSpec;
