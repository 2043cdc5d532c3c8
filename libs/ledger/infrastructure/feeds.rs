//! Stream wiring
//!
//! One reconnecting WebSocket client per stream. Each client's router turns
//! frames into typed messages with the domain decoder; its single handler
//! forwards them to the engine:
//!
//! ```text
//! book  → BookRouter  → BookHandler  → EngineEvent::BookDelta
//! price → PriceRouter → PriceHandler → price BatchThrottler
//! tap   → TapRouter   → TapHandler   → tap BatchThrottler
//! ```
//!
//! The first payload of every connection is a handshake token and is
//! discarded by the client before it reaches a router.

use super::config::StreamsConfig;
use crate::application::Ingest;
use crate::domain::decoder::{decode_book, decode_price, decode_tap};
use crate::domain::{BookMessage, PriceMessage, TapMessage};
use crate::error::Result;
use async_trait::async_trait;
use feedsockets::{
    ConnectionState, FeedError, MessageHandler, MessageRouter, Metrics, WebSocketClient, WsMessage,
};
use std::fmt;
use tracing::{info, warn};

/// The three streams; also the route key of each client
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum FeedKind {
    Book,
    Price,
    Tap,
}

impl FeedKind {
    pub const ALL: [FeedKind; 3] = [FeedKind::Book, FeedKind::Price, FeedKind::Tap];

    /// Log prefix
    pub fn label(&self) -> &'static str {
        match self {
            FeedKind::Book => "BookFeed",
            FeedKind::Price => "PriceFeed",
            FeedKind::Tap => "TapFeed",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedKind::Book => write!(f, "book"),
            FeedKind::Price => write!(f, "price"),
            FeedKind::Tap => write!(f, "tap"),
        }
    }
}

/// Connection state of each stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedStates {
    pub book: ConnectionState,
    pub price: ConnectionState,
    pub tap: ConnectionState,
}

impl FeedStates {
    pub fn get(&self, kind: FeedKind) -> ConnectionState {
        match kind {
            FeedKind::Book => self.book,
            FeedKind::Price => self.price,
            FeedKind::Tap => self.tap,
        }
    }

    pub fn all_connected(&self) -> bool {
        FeedKind::ALL
            .iter()
            .all(|k| self.get(*k) == ConnectionState::Connected)
    }

    /// Streams that ran out of retries and wait for an explicit reconnect
    pub fn exhausted(&self) -> Vec<FeedKind> {
        FeedKind::ALL
            .into_iter()
            .filter(|k| self.get(*k) == ConnectionState::Error)
            .collect()
    }
}

impl fmt::Display for FeedStates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "book={} price={} tap={}", self.book, self.price, self.tap)
    }
}

// =============================================================================
// Routers
// =============================================================================

pub struct BookRouter;

#[async_trait]
impl MessageRouter for BookRouter {
    type Message = BookMessage;
    type RouteKey = FeedKind;

    async fn parse(&self, message: WsMessage) -> feedsockets::Result<BookMessage> {
        decode_book(&message).ok_or_else(|| unrecognized(FeedKind::Book, &message))
    }

    fn route_key(&self, _message: &BookMessage) -> FeedKind {
        FeedKind::Book
    }
}

pub struct PriceRouter;

#[async_trait]
impl MessageRouter for PriceRouter {
    type Message = PriceMessage;
    type RouteKey = FeedKind;

    async fn parse(&self, message: WsMessage) -> feedsockets::Result<PriceMessage> {
        decode_price(&message).ok_or_else(|| unrecognized(FeedKind::Price, &message))
    }

    fn route_key(&self, _message: &PriceMessage) -> FeedKind {
        FeedKind::Price
    }
}

pub struct TapRouter;

#[async_trait]
impl MessageRouter for TapRouter {
    type Message = TapMessage;
    type RouteKey = FeedKind;

    async fn parse(&self, message: WsMessage) -> feedsockets::Result<TapMessage> {
        decode_tap(&message).ok_or_else(|| unrecognized(FeedKind::Tap, &message))
    }

    fn route_key(&self, _message: &TapMessage) -> FeedKind {
        FeedKind::Tap
    }
}

fn unrecognized(kind: FeedKind, message: &WsMessage) -> FeedError {
    let text = message.text_lossy();
    let preview: String = text.chars().take(80).collect();
    FeedError::ParseError(format!("unrecognized {} frame: {}", kind, preview))
}

// =============================================================================
// Handlers
// =============================================================================

pub struct BookHandler(pub Ingest);

impl MessageHandler<BookMessage> for BookHandler {
    fn handle(&mut self, message: BookMessage) -> feedsockets::Result<()> {
        self.0
            .book(message)
            .map_err(|e| FeedError::Handler(e.to_string()))
    }
}

pub struct PriceHandler(pub Ingest);

impl MessageHandler<PriceMessage> for PriceHandler {
    fn handle(&mut self, message: PriceMessage) -> feedsockets::Result<()> {
        self.0.price(message);
        Ok(())
    }
}

pub struct TapHandler(pub Ingest);

impl MessageHandler<TapMessage> for TapHandler {
    fn handle(&mut self, message: TapMessage) -> feedsockets::Result<()> {
        self.0.tap(message);
        Ok(())
    }
}

// =============================================================================
// Feed set
// =============================================================================

fn connect_one<R, H>(kind: FeedKind, url: &str, router: R, handler: H) -> Result<WebSocketClient<R>>
where
    R: MessageRouter<RouteKey = FeedKind>,
    H: MessageHandler<R::Message>,
{
    info!("[{}] Connecting to {}", kind.label(), url);
    let client = feedsockets::builder()
        .url(url)
        .discard_first_message()
        .router(router, |routing| routing.handler(kind, handler))
        .build()?;
    Ok(client)
}

/// The three stream clients of one engine
pub struct FeedSet {
    book: WebSocketClient<BookRouter>,
    price: WebSocketClient<PriceRouter>,
    tap: WebSocketClient<TapRouter>,
}

impl FeedSet {
    /// Must be called from within a tokio runtime
    pub fn connect(streams: &StreamsConfig, ingest: Ingest) -> Result<Self> {
        Ok(Self {
            book: connect_one(
                FeedKind::Book,
                &streams.book_url,
                BookRouter,
                BookHandler(ingest.clone()),
            )?,
            price: connect_one(
                FeedKind::Price,
                &streams.price_url,
                PriceRouter,
                PriceHandler(ingest.clone()),
            )?,
            tap: connect_one(FeedKind::Tap, &streams.tap_url, TapRouter, TapHandler(ingest))?,
        })
    }

    pub fn states(&self) -> FeedStates {
        FeedStates {
            book: self.book.connection_state(),
            price: self.price.connection_state(),
            tap: self.tap.connection_state(),
        }
    }

    pub fn metrics(&self, kind: FeedKind) -> Metrics {
        match kind {
            FeedKind::Book => self.book.metrics(),
            FeedKind::Price => self.price.metrics(),
            FeedKind::Tap => self.tap.metrics(),
        }
    }

    pub fn reconnect(&self, kind: FeedKind) -> Result<()> {
        info!("[{}] Reconnect requested", kind.label());
        match kind {
            FeedKind::Book => self.book.reconnect()?,
            FeedKind::Price => self.price.reconnect()?,
            FeedKind::Tap => self.tap.reconnect()?,
        }
        Ok(())
    }

    pub async fn shutdown(self) {
        let FeedSet { book, price, tap } = self;
        if let Err(e) = book.shutdown().await {
            warn!("[BookFeed] Shutdown error: {}", e);
        }
        if let Err(e) = price.shutdown().await {
            warn!("[PriceFeed] Shutdown error: {}", e);
        }
        if let Err(e) = tap.shutdown().await {
            warn!("[TapFeed] Shutdown error: {}", e);
        }
    }
}
