//! Feed client core: builder, configuration, connection task and state.
//!
//! ```rust,ignore
//! use feedsockets::*;
//!
//! let client = feedsockets::builder()
//!     .url("wss://feed.example.com/book")
//!     .discard_first_message()
//!     .router(BookRouter, |routing| routing.handler(BookRoute::Book, BookHandler::new(tx)))
//!     .build()?;
//!
//! assert_eq!(client.connection_state(), ConnectionState::Connecting);
//! client.shutdown().await?;
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;

// Re-export main types
pub use builder::{states, RoutingBuilder, WebSocketClientBuilder};
pub use client::{ClientEvent, Metrics, WebSocketClient};
pub use config::ClientConfig;
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
