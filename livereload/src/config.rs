//! Live-reload configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::timer::DEFAULT_FLUSH_DELAY;

/// Conventional live-reload port.
pub const DEFAULT_PORT: u16 = 35729;

/// Configuration for the live-reload coordinator.
#[derive(Debug, Clone)]
pub struct LiveReloadConfig {
    /// Interface the notification server binds to.
    pub host: IpAddr,

    /// Port the notification server binds to. Zero picks a free port.
    pub port: u16,

    /// Extensions (lowercase, no dot) whose changes trigger a reload.
    pub file_types: Vec<String>,

    /// Delay between the first change of a batch and its flush.
    pub flush_delay: Duration,
}

impl LiveReloadConfig {
    /// Create a configuration with the default port, types and delay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interface to bind.
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Set the port to bind.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Replace the reload-eligible extensions.
    pub fn with_file_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Set the delay between a batch's first change and its flush.
    pub fn with_flush_delay(mut self, delay: Duration) -> Self {
        self.flush_delay = delay;
        self
    }

    /// Address the server binds to.
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether a file with this extension triggers a reload.
    pub fn is_eligible(&self, extension: &str) -> bool {
        self.file_types
            .iter()
            .any(|t| t.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            file_types: default_file_types(),
            flush_delay: DEFAULT_FLUSH_DELAY,
        }
    }
}

/// Browser-facing asset types.
pub fn default_file_types() -> Vec<String> {
    ["css", "gif", "htm", "html", "ico", "jpeg", "jpg", "js", "png", "svg", "webp"]
        .into_iter()
        .map(String::from)
        .collect()
}
