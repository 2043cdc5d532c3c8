//! Domain layer: order model, stream message shapes and the frame decoder

pub mod decoder;
pub mod messages;
pub mod order;

pub use messages::{BookMessage, OrderPayload, PriceMessage, RawOrder, TapMessage};
pub use order::{parse_timestamp, Gtd, Order, OrderKey, OrderStatus, OrderType, ReportedProgress};
