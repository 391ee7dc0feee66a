//! Configuration for the watch orchestrator.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use kiln_livereload::LiveReloadConfig;
use kiln_watcher::{SessionConfig, SessionRole};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WatchError};

/// Configuration for the watch orchestrator, usually loaded from `kiln.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Source and destination roots.
    pub paths: PathsConfig,

    /// Feature switches.
    pub options: OptionsConfig,

    /// Live-reload server settings.
    pub livereload: LiveReloadSection,

    /// Include (partial) handling.
    pub include: IncludeConfig,

    /// Default watch filters per session.
    pub glob: GlobConfig,

    /// Quiet windows and delays.
    pub timing: TimingConfig,
}

impl WatchConfig {
    /// Create a configuration for the given roots with default settings.
    pub fn new(source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            paths: PathsConfig {
                source: source.into(),
                dest: dest.into(),
            },
            ..Self::default()
        }
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&text)
    }

    /// Parse a configuration document.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Enable or disable live-reload.
    pub fn with_livereload(mut self, enabled: bool) -> Self {
        self.options.livereload = enabled;
        self
    }

    /// Enable or disable watching altogether.
    pub fn with_watch(mut self, enabled: bool) -> Self {
        self.options.watch = enabled;
        self
    }

    /// Mark the caller as interactive (no readiness grace).
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.options.interactive = interactive;
        self
    }

    /// Enable debug logging of suppressed changes.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.options.debug = debug;
        self
    }

    /// Set the live-reload port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.livereload.port = port;
        self
    }

    /// Set the live-reload bind host.
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.livereload.host = host;
        self
    }

    /// Check that the roots can be watched together.
    pub fn validate_paths(&self) -> Result<()> {
        let source = &self.paths.source;
        let dest = &self.paths.dest;

        if source.as_os_str().is_empty() {
            return Err(WatchError::InvalidPaths("source path is empty".to_string()));
        }
        if dest.as_os_str().is_empty() {
            return Err(WatchError::InvalidPaths("destination path is empty".to_string()));
        }
        if source == dest {
            return Err(WatchError::InvalidPaths(format!(
                "source and destination are the same directory: {}",
                source.display()
            )));
        }
        if dest.starts_with(source) {
            return Err(WatchError::InvalidPaths(format!(
                "destination {} is inside source {}",
                dest.display(),
                source.display()
            )));
        }
        if source.starts_with(dest) {
            return Err(WatchError::InvalidPaths(format!(
                "source {} is inside destination {}",
                source.display(),
                dest.display()
            )));
        }

        Ok(())
    }

    /// Session configuration for the source tree.
    pub fn source_session(&self) -> SessionConfig {
        self.session(SessionRole::Source, &self.paths.source, &self.glob.source)
    }

    /// Session configuration for the destination tree.
    pub fn dest_session(&self) -> SessionConfig {
        self.session(SessionRole::Destination, &self.paths.dest, &self.glob.dest)
    }

    fn session(&self, role: SessionRole, root: &Path, glob: &str) -> SessionConfig {
        SessionConfig::new(role, root)
            .with_default_glob(glob)
            .with_ready_grace(self.timing.ready_grace())
            .interactive(self.options.interactive)
    }

    /// Configuration for the live-reload coordinator.
    pub fn livereload_config(&self) -> LiveReloadConfig {
        LiveReloadConfig::new()
            .with_host(self.livereload.host)
            .with_port(self.livereload.port)
            .with_file_types(self.livereload.file_types.iter().cloned())
            .with_flush_delay(self.timing.flush_delay())
    }
}

/// Source and destination roots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Tree edited by the user.
    pub source: PathBuf,

    /// Tree the build writes to.
    pub dest: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("source"),
            dest: PathBuf::from("dest"),
        }
    }
}

/// Feature switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsConfig {
    /// Watch at all. When false, `process_watch` does nothing.
    pub watch: bool,

    /// Serve live-reload and watch the destination tree.
    pub livereload: bool,

    /// Log suppressed duplicate changes.
    pub debug: bool,

    /// Driven by an operator at a terminal.
    pub interactive: bool,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            watch: true,
            livereload: true,
            debug: false,
            interactive: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveReloadSection {
    pub host: IpAddr,
    pub port: u16,

    /// Destination extensions that trigger a reload.
    pub file_types: Vec<String>,
}

impl Default for LiveReloadSection {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: kiln_livereload::DEFAULT_PORT,
            file_types: kiln_livereload::default_file_types(),
        }
    }
}

/// Include (partial) handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IncludeConfig {
    /// File name prefix marking a file as an include.
    pub prefix: String,

    /// Extensions whose includes can be embedded in other files of the same
    /// type.
    pub file_types: Vec<String>,
}

impl Default for IncludeConfig {
    fn default() -> Self {
        Self {
            prefix: "_".to_string(),
            file_types: ["css", "html", "js"].into_iter().map(String::from).collect(),
        }
    }
}

impl IncludeConfig {
    /// Whether `name` is an include file name.
    pub fn is_include(&self, name: &str) -> bool {
        !self.prefix.is_empty() && name.starts_with(&self.prefix)
    }

    /// Whether includes with this extension fan out.
    pub fn is_embeddable(&self, extension: &str) -> bool {
        self.file_types
            .iter()
            .any(|t| t.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}

/// Default watch filters. Empty watches the whole root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobConfig {
    pub source: String,
    pub dest: String,
}

/// Quiet windows and delays, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Window inside which repeated source changes are suppressed.
    pub quiet_window_ms: u64,

    /// Delay between the first destination change and the reload push.
    pub flush_delay_ms: u64,

    /// Extra delay after readiness for non-interactive callers.
    pub ready_grace_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            quiet_window_ms: 300,
            flush_delay_ms: 300,
            ready_grace_ms: 700,
        }
    }
}

impl TimingConfig {
    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.quiet_window_ms)
    }

    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms)
    }

    pub fn ready_grace(&self) -> Duration {
        Duration::from_millis(self.ready_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = WatchConfig::default();

        assert!(config.options.watch);
        assert!(config.options.livereload);
        assert_eq!(config.livereload.port, 35729);
        assert_eq!(config.include.prefix, "_");
        assert_eq!(config.timing.quiet_window(), Duration::from_millis(300));
        assert_eq!(config.timing.ready_grace(), Duration::from_millis(700));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = WatchConfig::from_toml(
            r#"
            [paths]
            source = "/site/source"
            dest = "/site/dest"

            [options]
            livereload = false

            [include]
            file_types = ["css"]
            "#,
        )
        .unwrap();

        assert_eq!(config.paths.source, PathBuf::from("/site/source"));
        assert!(!config.options.livereload);
        assert!(config.options.watch);
        assert!(config.include.is_embeddable("css"));
        assert!(!config.include.is_embeddable("js"));
        assert_eq!(config.timing.flush_delay_ms, 300);
    }

    #[test]
    fn test_malformed_toml_is_reported() {
        let result = WatchConfig::from_toml("[paths\nsource = 1");
        assert!(matches!(result, Err(WatchError::Toml(_))));
    }

    #[test]
    fn test_validate_paths() {
        assert!(WatchConfig::new("/site/source", "/site/dest").validate_paths().is_ok());

        let cases = [
            WatchConfig::new("", "/site/dest"),
            WatchConfig::new("/site/source", ""),
            WatchConfig::new("/site", "/site"),
            WatchConfig::new("/site", "/site/dest"),
            WatchConfig::new("/site/source/out", "/site/source"),
        ];
        for config in cases {
            assert!(
                matches!(config.validate_paths(), Err(WatchError::InvalidPaths(_))),
                "{:?} should be rejected",
                config.paths
            );
        }
    }

    #[test]
    fn test_session_configs_follow_options() {
        let mut config = WatchConfig::new("/site/source", "/site/dest").with_interactive(true);
        config.glob.dest = "**/*.css".to_string();

        let source = config.source_session();
        let dest = config.dest_session();

        assert_eq!(source.role, SessionRole::Source);
        assert_eq!(source.effective_grace(), Duration::ZERO);
        assert_eq!(dest.root, PathBuf::from("/site/dest"));
        assert_eq!(dest.default_glob, "**/*.css");
    }

    #[test]
    fn test_include_detection() {
        let include = IncludeConfig::default();
        assert!(include.is_include("_header.html"));
        assert!(!include.is_include("index.html"));
    }
}
