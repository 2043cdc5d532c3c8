//! Common test utilities for FeedSockets integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use feedsockets::{FeedError, MessageHandler, MessageRouter, WsMessage};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// What the mock server does on each accepted connection
#[derive(Clone, Debug)]
pub struct Script {
    /// Sent first on every connection
    pub handshake: Option<String>,
    /// Data frames sent after the handshake; `{n}` is replaced by the
    /// 1-based connection number
    pub frames: Vec<String>,
    /// Pause between frames
    pub pace: Duration,
    /// Close the socket once the frames are sent
    pub close_after: bool,
}

impl Script {
    pub fn new(handshake: Option<&str>, frames: &[&str]) -> Self {
        Self {
            handshake: handshake.map(str::to_string),
            frames: frames.iter().map(|f| f.to_string()).collect(),
            pace: Duration::from_millis(5),
            close_after: false,
        }
    }

    pub fn closing(mut self) -> Self {
        self.close_after = true;
        self
    }
}

/// A scripted WebSocket server on an ephemeral local port
pub struct MockWsServer {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
}

impl MockWsServer {
    pub async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let connections = Arc::new(AtomicUsize::new(0));

        let shutdown_clone = Arc::clone(&shutdown);
        let connections_clone = Arc::clone(&connections);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        let Ok((stream, _)) = result else { break };
                        let n = connections_clone.fetch_add(1, Ordering::SeqCst) + 1;
                        let script = script.clone();
                        let shutdown = Arc::clone(&shutdown_clone);
                        tokio::spawn(async move {
                            Self::handle_connection(stream, script, n, shutdown).await;
                        });
                    }
                    _ = shutdown_clone.notified() => break,
                }
            }
        });

        Self {
            addr,
            connections,
            shutdown,
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        script: Script,
        n: usize,
        shutdown: Arc<Notify>,
    ) {
        use futures_util::{SinkExt, StreamExt};
        use tokio_tungstenite::tungstenite::Message;

        let Ok(ws_stream) = tokio_tungstenite::accept_async(stream).await else {
            return;
        };
        let (mut write, mut read) = ws_stream.split();

        if let Some(token) = &script.handshake {
            if write.send(Message::Text(token.clone())).await.is_err() {
                return;
            }
        }

        for frame in &script.frames {
            tokio::time::sleep(script.pace).await;
            let text = frame.replace("{n}", &n.to_string());
            if write.send(Message::Text(text)).await.is_err() {
                return;
            }
        }

        if script.close_after {
            let _ = write.close().await;
            return;
        }

        loop {
            tokio::select! {
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

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A URL on which nothing is listening
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}", addr)
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct Route;

/// Passes text frames through; the literal `bad` fails to parse
pub struct TextRouter;

#[async_trait]
impl MessageRouter for TextRouter {
    type Message = String;
    type RouteKey = Route;

    async fn parse(&self, message: WsMessage) -> feedsockets::Result<String> {
        match message.as_text() {
            Some("bad") => Err(FeedError::ParseError("bad frame".into())),
            Some(text) => Ok(text.to_string()),
            None => Err(FeedError::ParseError("binary frame".into())),
        }
    }

    fn route_key(&self, _message: &String) -> Route {
        Route
    }
}

/// Forwards every message into a crossbeam channel
pub struct Forward(pub crossbeam_channel::Sender<String>);

impl MessageHandler<String> for Forward {
    fn handle(&mut self, message: String) -> feedsockets::Result<()> {
        self.0
            .send(message)
            .map_err(|e| FeedError::Handler(e.to_string()))
    }
}

/// Collect `count` messages or give up after `timeout`
pub async fn collect(
    rx: &crossbeam_channel::Receiver<String>,
    count: usize,
    timeout: Duration,
) -> Vec<String> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut out = Vec::new();
    while out.len() < count && tokio::time::Instant::now() < deadline {
        match rx.try_recv() {
            Ok(msg) => out.push(msg),
            Err(_) => tokio::time::sleep(Duration::from_millis(5)).await,
        }
    }
    out
}
