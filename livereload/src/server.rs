//! HTTP notification server that live-reload clients connect to.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use futures::Stream;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{LiveReloadError, Result};
use crate::notifier::{CHANGED_PATH, ChangedFiles};

const NOTICE_CAPACITY: usize = 64;

#[derive(Clone)]
struct ServerState {
    notices: broadcast::Sender<ChangedFiles>,
    shutdown: CancellationToken,
}

/// A bound notification server.
///
/// `POST /changed` accepts a change batch and rebroadcasts it to every
/// client connected to `GET /events` and to in-process subscribers.
pub struct LiveReloadServer {
    addr: SocketAddr,
    notices: broadcast::Sender<ChangedFiles>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl LiveReloadServer {
    /// Bind to `addr` and start serving.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| LiveReloadError::Bind { addr, source })?;
        let local = listener.local_addr()?;

        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        let shutdown = CancellationToken::new();
        let state = ServerState {
            notices: notices.clone(),
            shutdown: shutdown.clone(),
        };

        let app = Router::new()
            .route("/", get(welcome))
            .route(CHANGED_PATH, post(changed))
            .route("/events", get(events))
            .with_state(state);

        let signal = shutdown.clone().cancelled_owned();
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(signal)
                .await
            {
                error!("Live-reload server failed: {e}");
            }
        });

        info!("Live-reload server listening on {local}");

        Ok(Self {
            addr: local,
            notices,
            shutdown,
            task: Some(task),
        })
    }

    /// Address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Receive every batch posted to the server.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangedFiles> {
        self.notices.subscribe()
    }

    /// Shut down and wait until the port is released.
    pub async fn close(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Live-reload server task ended abnormally: {e}");
            }
        }
        info!("Live-reload server on {} closed", self.addr);
    }
}

impl Drop for LiveReloadServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn welcome() -> Json<Value> {
    Json(json!({
        "kiln": "Welcome",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn changed(
    State(state): State<ServerState>,
    body: Bytes,
) -> std::result::Result<Json<Value>, (StatusCode, String)> {
    let notice: ChangedFiles = serde_json::from_slice(&body)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid change batch: {e}")))?;

    let clients = state.notices.send(notice.clone()).unwrap_or(0);
    debug!(
        "Broadcast {} changed file(s) to {clients} client(s)",
        notice.files.len()
    );

    Ok(Json(json!({
        "clients": clients,
        "files": notice.files,
    })))
}

async fn events(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let notices = state.notices.subscribe();
    let stream = futures::stream::unfold(
        (notices, state.shutdown),
        |(mut notices, shutdown)| async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return None,
                    notice = notices.recv() => match notice {
                        Ok(notice) => {
                            let data = serde_json::to_string(&notice).unwrap_or_default();
                            let event = Event::default().event("reload").data(data);
                            return Some((Ok(event), (notices, shutdown)));
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            debug!("Event stream client lagged by {skipped} notice(s)");
                        }
                        Err(RecvError::Closed) => return None,
                    },
                }
            }
        },
    );

    Sse::new(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::{HttpNotifier, ReloadNotifier};
    use pretty_assertions::assert_eq;

    fn any_port() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn test_welcome_document() {
        let server = LiveReloadServer::bind(any_port()).await.unwrap();
        let url = format!("http://{}/", server.local_addr());

        let body: Value = reqwest::get(&url).await.unwrap().json().await.unwrap();

        assert_eq!(body["kiln"], "Welcome");
        server.close().await;
    }

    #[tokio::test]
    async fn test_posted_batch_reaches_subscribers() {
        let server = LiveReloadServer::bind(any_port()).await.unwrap();
        let mut notices = server.subscribe();
        let notifier = HttpNotifier::fixed(server.local_addr());

        let batch = ChangedFiles::new(vec!["css/app.css".into()]);
        notifier.notify(&batch).await.unwrap();

        assert_eq!(notices.recv().await.unwrap(), batch);
        server.close().await;
    }

    #[tokio::test]
    async fn test_malformed_batch_is_rejected() {
        let server = LiveReloadServer::bind(any_port()).await.unwrap();
        let url = format!("http://{}/changed", server.local_addr());

        let response = reqwest::Client::new()
            .post(&url)
            .body("files=index.html")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        server.close().await;
    }

    #[tokio::test]
    async fn test_close_releases_port() {
        let server = LiveReloadServer::bind(any_port()).await.unwrap();
        let addr = server.local_addr();
        server.close().await;

        let again = LiveReloadServer::bind(addr).await.unwrap();
        assert_eq!(again.local_addr(), addr);
        again.close().await;
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let server = LiveReloadServer::bind(any_port()).await.unwrap();

        let result = LiveReloadServer::bind(server.local_addr()).await;

        assert!(matches!(result, Err(LiveReloadError::Bind { .. })));
        server.close().await;
    }
}
