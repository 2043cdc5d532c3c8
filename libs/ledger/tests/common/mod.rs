//! Common test utilities for ledger integration tests

#![allow(dead_code)]

use ledger::infrastructure::{ApiConfig, LedgerConfig, StreamsConfig};
use ledger::LedgerView;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch, Notify};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

// =============================================================================
// WebSocket feed server
// =============================================================================

/// A local WebSocket feed: sends a handshake token on every connection,
/// then relays whatever the test pushes with [`send`](Self::send)
pub struct MockFeedServer {
    pub addr: SocketAddr,
    frames: broadcast::Sender<String>,
    connections: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
}

impl MockFeedServer {
    pub async fn start(handshake: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (frames, _) = broadcast::channel(256);
        let connections = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(Notify::new());

        let handshake = handshake.to_string();
        let frames_clone = frames.clone();
        let connections_clone = Arc::clone(&connections);
        let shutdown_clone = Arc::clone(&shutdown);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        let Ok((stream, _)) = result else { break };
                        // Subscribe before the upgrade so nothing pushed after
                        // the client reports Connected is missed
                        let rx = frames_clone.subscribe();
                        connections_clone.fetch_add(1, Ordering::SeqCst);
                        let handshake = handshake.clone();
                        let shutdown = Arc::clone(&shutdown_clone);
                        tokio::spawn(Self::relay(stream, handshake, rx, shutdown));
                    }
                    _ = shutdown_clone.notified() => break,
                }
            }
        });

        Self {
            addr,
            frames,
            connections,
            shutdown,
        }
    }

    async fn relay(
        stream: TcpStream,
        handshake: String,
        mut frames: broadcast::Receiver<String>,
        shutdown: Arc<Notify>,
    ) {
        use futures_util::{SinkExt, StreamExt};
        use tokio_tungstenite::tungstenite::Message;

        let Ok(ws_stream) = tokio_tungstenite::accept_async(stream).await else {
            return;
        };
        let (mut write, mut read) = ws_stream.split();

        if write.send(Message::Text(handshake)).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                frame = frames.recv() => match frame {
                    Ok(text) => {
                        if write.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                msg = read.next() => match msg {
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                },
                _ = shutdown.notified() => break,
            }
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Push a frame to every connected client
    pub fn send(&self, frame: impl Into<String>) {
        let _ = self.frames.send(frame.into());
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for MockFeedServer {
    fn drop(&mut self) {
        self.shutdown.notify_waiters();
    }
}

// =============================================================================
// HTTP snapshot endpoint
// =============================================================================

/// Mount `GET /sql?limit=<limit>` answering with `status` and a raw body
pub async fn mount_snapshot(server: &MockServer, status: u16, body: impl Into<String>, limit: usize) {
    Mock::given(method("GET"))
        .and(path("/sql"))
        .and(query_param("limit", limit.to_string()))
        .respond_with(ResponseTemplate::new(status).set_body_raw(body.into(), "application/json"))
        .mount(server)
        .await;
}

/// A mock server whose snapshot endpoint expects the default limit
pub async fn snapshot_server(status: u16, body: impl Into<String>) -> MockServer {
    let server = MockServer::start().await;
    mount_snapshot(&server, status, body, 1000).await;
    server
}

/// Requests the server saw, as `(method, path?query)` pairs
pub async fn request_targets(server: &MockServer) -> Vec<(String, String)> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| {
            let target = match request.url.query() {
                Some(query) => format!("{}?{}", request.url.path(), query),
                None => request.url.path().to_string(),
            };
            (request.method.to_string(), target)
        })
        .collect()
}

/// An http:// URL on which nothing is listening
pub async fn dead_http_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

// =============================================================================
// Helpers
// =============================================================================

pub fn api_config(base_url: &str) -> ApiConfig {
    ApiConfig {
        base_url: base_url.to_string(),
        snapshot_limit: 1000,
        order_path: "/rec".to_string(),
    }
}

pub fn ledger_config(
    base_url: &str,
    book: &MockFeedServer,
    price: &MockFeedServer,
    tap: &MockFeedServer,
) -> LedgerConfig {
    LedgerConfig {
        api: api_config(base_url),
        streams: StreamsConfig {
            book_url: book.ws_url(),
            price_url: price.ws_url(),
            tap_url: tap.ws_url(),
        },
        wallet: None,
        log_level: "debug".to_string(),
    }
}

/// Wait until a published view satisfies `pred`
pub async fn wait_for_view(
    views: &mut watch::Receiver<Arc<LedgerView>>,
    timeout: Duration,
    pred: impl Fn(&LedgerView) -> bool,
) -> Option<Arc<LedgerView>> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        {
            let view = views.borrow_and_update();
            if pred(&view) {
                return Some(Arc::clone(&view));
            }
        }
        match tokio::time::timeout_at(deadline, views.changed()).await {
            Ok(Ok(())) => {}
            _ => return None,
        }
    }
}

/// Poll `check` every 10ms until it holds or `timeout` passes
pub async fn eventually(timeout: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
