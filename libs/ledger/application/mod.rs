//! Application layer: reconciliation, throttling, highlights, projection and
//! the single-writer engine that ties them together

pub mod engine;
pub mod highlight;
pub mod projector;
pub mod reconciler;
pub mod throttle;

pub use engine::{EngineEvent, Ingest, LedgerEngine, LedgerHandle};
pub use highlight::{HighlightTracker, HIGHLIGHT_TTL};
pub use projector::{project, LedgerView};
pub use reconciler::{AssetQuote, Reconciler, TapProgress};
pub use throttle::{BatchThrottler, FLUSH_INTERVAL};
