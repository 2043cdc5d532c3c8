//! Infrastructure layer: configuration, logging, the REST client and the
//! WebSocket stream wiring

pub mod config;
pub mod feeds;
pub mod logging;
pub mod rest;

pub use config::{ApiConfig, ConfigError, LedgerConfig, StreamsConfig};
pub use feeds::{FeedKind, FeedSet, FeedStates};
pub use logging::init_tracing;
pub use rest::LedgerRestClient;
