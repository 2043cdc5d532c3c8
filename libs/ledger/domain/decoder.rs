//! Frame decoder
//!
//! Turns a raw stream frame into JSON and then into one of the typed stream
//! messages. The upstream service sometimes double-encodes its JSON (a JSON
//! string whose content is the real document), and sends plain-text
//! sentinels such as handshake tokens. Both are handled here; nothing past
//! this boundary ever sees a raw frame.
//!
//! Every function returns `None` on failure and never panics.

use super::messages::{BookMessage, PriceMessage, TapMessage};
use feedsockets::WsMessage;
use serde_json::Value;
use tracing::trace;

/// Parse text as JSON, unwrapping one level of string double-encoding
pub fn decode_text(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(text) {
        Ok(Value::String(inner)) => match serde_json::from_str::<Value>(&inner) {
            Ok(value) => Some(value),
            Err(e) => {
                trace!("[Decoder] Inner document is not JSON: {}", e);
                None
            }
        },
        Ok(value) => Some(value),
        Err(e) => {
            trace!("[Decoder] Frame is not JSON: {}", e);
            None
        }
    }
}

/// Accept already-structured input as-is; strings are decoded as text
pub fn decode_value(value: Value) -> Option<Value> {
    match value {
        Value::String(text) => decode_text(&text),
        other => Some(other),
    }
}

/// Decode a WebSocket frame (binary frames are read as UTF-8)
pub fn decode_frame(frame: &WsMessage) -> Option<Value> {
    decode_text(&frame.text_lossy())
}

pub fn decode_book(frame: &WsMessage) -> Option<BookMessage> {
    decode_frame(frame).and_then(BookMessage::from_value)
}

pub fn decode_price(frame: &WsMessage) -> Option<PriceMessage> {
    decode_frame(frame).and_then(|v| PriceMessage::from_value(&v))
}

pub fn decode_tap(frame: &WsMessage) -> Option<TapMessage> {
    decode_frame(frame).and_then(|v| TapMessage::from_value(&v))
}
