//! Push of batched changes to the notification endpoint.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::error::{LiveReloadError, Result};

/// Path the change batch is posted to.
pub const CHANGED_PATH: &str = "/changed";

/// Content type the push is sent with. The body is JSON regardless.
pub const PUSH_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// How long a single push may take before it is abandoned.
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Body of a change push: destination paths relative to the destination root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFiles {
    /// Changed paths, forward-slash separated.
    pub files: Vec<String>,
}

impl ChangedFiles {
    /// Wrap a list of relative paths.
    pub fn new(files: Vec<String>) -> Self {
        Self { files }
    }
}

/// Something that can deliver a change batch to live-reload clients.
#[async_trait]
pub trait ReloadNotifier: Send + Sync {
    /// Deliver one batch.
    async fn notify(&self, changes: &ChangedFiles) -> Result<()>;
}

/// Where to push, given the address a server is bound to.
///
/// A server listening on every interface is reached over loopback.
pub fn push_address(bound: SocketAddr) -> SocketAddr {
    if bound.ip().is_unspecified() {
        let loopback = match bound.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(_) => IpAddr::V6(std::net::Ipv6Addr::LOCALHOST),
        };
        SocketAddr::new(loopback, bound.port())
    } else {
        bound
    }
}

/// Posts batches over HTTP to `POST /changed`.
///
/// The endpoint follows the coordinator's server: when the server is
/// rebound, later pushes go to the new address. The HTTP client is created
/// on the first push and reused afterwards.
pub struct HttpNotifier {
    endpoint: watch::Receiver<Option<SocketAddr>>,
    client: OnceLock<reqwest::Client>,
    timeout: Duration,
}

impl HttpNotifier {
    /// Push to whatever address `endpoint` currently holds.
    pub fn new(endpoint: watch::Receiver<Option<SocketAddr>>) -> Self {
        Self {
            endpoint,
            client: OnceLock::new(),
            timeout: DEFAULT_PUSH_TIMEOUT,
        }
    }

    /// Give up on a push that has not completed within `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Push to a fixed address.
    pub fn fixed(addr: SocketAddr) -> Self {
        let (tx, rx) = watch::channel(Some(addr));
        // The receiver keeps the last value after the sender is gone.
        drop(tx);
        Self::new(rx)
    }

    fn client(&self) -> &reqwest::Client {
        self.client.get_or_init(reqwest::Client::new)
    }

    fn url(&self) -> Result<String> {
        let addr = (*self.endpoint.borrow()).ok_or(LiveReloadError::ServerNotRunning)?;
        Ok(format!("http://{addr}{CHANGED_PATH}"))
    }
}

#[async_trait]
impl ReloadNotifier for HttpNotifier {
    async fn notify(&self, changes: &ChangedFiles) -> Result<()> {
        let url = self.url()?;
        let body = serde_json::to_string(changes)?;

        debug!("Pushing {} changed file(s) to {url}", changes.files.len());

        let response = self
            .client()
            .post(&url)
            .header(CONTENT_TYPE, PUSH_CONTENT_TYPE)
            .timeout(self.timeout)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LiveReloadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
