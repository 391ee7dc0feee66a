//! Argument handling for the `kiln` binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use kiln_watch::{Collaborators, CopyPipeline, RemoveCleaner, WatchConfig};
use tracing_subscriber::EnvFilter;

/// Default configuration file, read when present.
pub const DEFAULT_CONFIG_FILE: &str = "kiln.toml";

/// Kiln - watch a source tree, rebuild what changed, reload the browser
#[derive(Debug, Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./kiln.toml when it exists)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Source directory
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Destination directory
    #[arg(long)]
    pub dest: Option<PathBuf>,

    /// Glob filter for the source watch, relative to the source directory
    #[arg(long)]
    pub source_glob: Option<String>,

    /// Glob filter for the destination watch, relative to the destination directory
    #[arg(long)]
    pub dest_glob: Option<String>,

    /// Do not serve live-reload or watch the destination
    #[arg(long)]
    pub no_livereload: bool,

    /// Live-reload port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log suppressed changes and other debug detail
    #[arg(short, long)]
    pub debug: bool,
}

impl Cli {
    /// Load the configuration file and apply command-line overrides.
    pub fn resolve_config(&self) -> anyhow::Result<WatchConfig> {
        let mut config = match &self.config {
            Some(path) => WatchConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None if std::path::Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                WatchConfig::load(DEFAULT_CONFIG_FILE)
                    .with_context(|| format!("loading {DEFAULT_CONFIG_FILE}"))?
            }
            None => WatchConfig::default(),
        };

        self.apply_overrides(&mut config);

        // Watch events carry absolute paths; roots must match them.
        config.paths.source = std::path::absolute(&config.paths.source)
            .with_context(|| format!("resolving {}", config.paths.source.display()))?;
        config.paths.dest = std::path::absolute(&config.paths.dest)
            .with_context(|| format!("resolving {}", config.paths.dest.display()))?;

        Ok(config)
    }

    /// Apply command-line flags over a loaded configuration.
    pub fn apply_overrides(&self, config: &mut WatchConfig) {
        if let Some(source) = &self.source {
            config.paths.source = source.clone();
        }
        if let Some(dest) = &self.dest {
            config.paths.dest = dest.clone();
        }
        if let Some(glob) = &self.source_glob {
            config.glob.source = glob.clone();
        }
        if let Some(glob) = &self.dest_glob {
            config.glob.dest = glob.clone();
        }
        if self.no_livereload {
            config.options.livereload = false;
        }
        if let Some(port) = self.port {
            config.livereload.port = port;
        }
        if self.debug {
            config.options.debug = true;
        }
        config.options.interactive = true;
    }
}

/// Install the fmt subscriber. `RUST_LOG` wins over the debug flag.
pub fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Collaborators that copy sources into the destination tree.
pub fn default_collaborators(config: &WatchConfig) -> Collaborators {
    Collaborators::new(
        Arc::new(CopyPipeline::new(&config.paths.source, &config.paths.dest)),
        Arc::new(RemoveCleaner),
    )
}
