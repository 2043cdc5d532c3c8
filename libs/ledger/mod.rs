//! Order Ledger
//!
//! Keeps one consistent, de-duplicated view of a mutable order ledger fed by
//! a startup snapshot and three independently reconnecting streams (order
//! book deltas, asset prices, escrow fill progress).
//!
//! ## Layers
//!
//! - **domain**: order model, normalization, wire message shapes, frame decoder
//! - **application**: reconciler, batch throttler, highlight tracker, view
//!   projector and the single-writer engine
//! - **infrastructure**: configuration, logging, REST snapshot/order client,
//!   stream wiring
//! - **utils**: shutdown coordination

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod utils;

pub use application::{
    project, AssetQuote, BatchThrottler, EngineEvent, HighlightTracker, Ingest, LedgerEngine,
    LedgerHandle, LedgerView, Reconciler, TapProgress,
};
pub use domain::{
    BookMessage, Gtd, Order, OrderKey, OrderStatus, OrderType, PriceMessage, ReportedProgress,
    TapMessage,
};
pub use error::{LedgerError, Result};
pub use infrastructure::{init_tracing, FeedKind, FeedStates, LedgerConfig, LedgerRestClient};
pub use utils::ShutdownManager;

pub use feedsockets::ConnectionState;
