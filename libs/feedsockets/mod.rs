//! # FeedSockets
//!
//! A small, reconnecting WebSocket feed client for long-lived market data
//! streams.
//!
//! ## Features
//!
//! - **Atomic connection state**: readable from any thread without locking
//! - **Type-state builder**: URL and router must be set before `build()`
//! - **Ordered delivery**: frames are parsed and routed in arrival order
//! - **Bounded backoff**: pluggable reconnection strategies, terminal `Error` state
//! - **Handshake skipping**: optionally drop the first payload of each connection

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core client functionality
pub use core::{
    builder, client, config, connection_state,
    builder::{states, RoutingBuilder, WebSocketClientBuilder},
    client::{ClientEvent, Metrics, WebSocketClient},
    config::ClientConfig,
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState},
};

/// Convenience constructor for a fresh builder
pub fn builder() -> WebSocketClientBuilder<states::NoUrl, states::NoRouter, ()> {
    WebSocketClientBuilder::new()
}

/// Type alias for Result with FeedError
pub type Result<T> = std::result::Result<T, traits::FeedError>;
