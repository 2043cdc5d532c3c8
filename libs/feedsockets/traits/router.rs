//! Message Routing
//!
//! ```text
//! WebSocket → handshake? → Router::parse → route key → channel → handler thread
//! ```
//!
//! Frames from one connection are parsed in arrival order and each route key
//! has exactly one handler thread, so messages sharing a route are handled
//! sequentially in the order they arrived.

use crate::{Result, WsMessage};
use async_trait::async_trait;
use std::fmt::Debug;
use std::hash::Hash;

/// Turns raw frames into typed messages and picks the handler for each
///
/// A `parse` error is logged and the frame skipped; it never tears down the
/// connection.
#[async_trait]
pub trait MessageRouter: Send + Sync + 'static {
    /// The parsed message type
    type Message: Send + Debug + 'static;

    /// The route key type (determines which handler processes the message)
    type RouteKey: Hash + Eq + Clone + Send + Sync + Debug + 'static;

    /// Parse a raw WebSocket frame into a typed message
    async fn parse(&self, message: WsMessage) -> Result<Self::Message>;

    /// Extract the route key from a parsed message
    fn route_key(&self, message: &Self::Message) -> Self::RouteKey;
}

/// Sequential consumer of typed messages
///
/// Each handler runs on its own OS thread. Errors are logged and the
/// thread keeps consuming.
pub trait MessageHandler<M>: Send + 'static
where
    M: Send + Debug + 'static,
{
    fn handle(&mut self, message: M) -> Result<()>;
}

