//! # FeedSockets Traits
//!
//! The seams of the feed client:
//!
//! - **MessageRouter**: decode a raw frame into a typed message and pick its route
//! - **MessageHandler**: consume typed messages sequentially on a dedicated thread
//! - **ReconnectionStrategy**: decide how long to wait before the next attempt

pub mod error;
pub mod parser;
pub mod reconnect;
pub mod router;

pub use error::{FeedError, Result};
pub use parser::WsMessage;
pub use reconnect::{
    ExponentialBackoff, FixedDelay, NeverReconnect, ReconnectionStrategy, DEFAULT_INITIAL_DELAY,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY,
};
pub use router::{MessageHandler, MessageRouter};
