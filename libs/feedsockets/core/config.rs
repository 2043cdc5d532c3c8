use crate::traits::*;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Resolved configuration of one feed client
///
/// Produced by the type-state builder and shared (behind an `Arc`) between
/// the connection task and the client handle.
pub struct ClientConfig<R>
where
    R: MessageRouter,
{
    /// WebSocket URL (wss:// or ws://)
    pub(crate) url: String,

    /// Frame decoder and route selector
    pub(crate) router: Arc<R>,

    /// Channel senders mapped by route key
    pub(crate) route_senders: HashMap<R::RouteKey, crossbeam_channel::Sender<R::Message>>,

    /// Reconnection strategy
    pub(crate) reconnect_strategy: Box<dyn ReconnectionStrategy>,

    /// Drop the first payload of every connection (server handshake token)
    pub(crate) discard_first_message: bool,

    /// Shutdown flag - when false, no further frames are delivered and no
    /// reconnect is attempted
    pub(crate) shutdown_flag: Arc<AtomicBool>,
}

impl<R> ClientConfig<R>
where
    R: MessageRouter,
{
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn discards_first_message(&self) -> bool {
        self.discard_first_message
    }

    pub fn handler_count(&self) -> usize {
        self.route_senders.len()
    }
}
