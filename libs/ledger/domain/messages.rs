//! Typed stream messages
//!
//! Each stream has a loose JSON wire shape. These types are the tagged
//! unions the decoder produces; anything that does not fit one of them is
//! rejected at the boundary.

use serde_json::{Map, Value};
use std::collections::HashMap;

/// Loosely-typed order record as delivered by the snapshot and book stream
pub type RawOrder = Value;

/// Order payload carried inside a book envelope
#[derive(Debug, Clone, PartialEq)]
pub enum OrderPayload {
    Single(RawOrder),
    Batch(Vec<RawOrder>),
}

/// Book stream message
#[derive(Debug, Clone, PartialEq)]
pub enum BookMessage {
    /// `{uuid, data}` where `data` is one order or an array of orders
    Envelope { uuid: String, data: OrderPayload },
    /// Bare order object, recognized by carrying both `uuid` and `date`
    Flat(RawOrder),
}

impl BookMessage {
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut obj) = value else {
            return None;
        };

        if let Some(data) = obj.remove("data") {
            let uuid = match obj.get("uuid") {
                Some(Value::String(s)) => s.trim().to_string(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            };
            let data = match data {
                Value::Array(items) => OrderPayload::Batch(items),
                single @ Value::Object(_) => OrderPayload::Single(single),
                _ => return None,
            };
            return Some(BookMessage::Envelope { uuid, data });
        }

        if obj.contains_key("uuid") && obj.contains_key("date") {
            return Some(BookMessage::Flat(Value::Object(obj)));
        }

        None
    }

    /// Envelope uuid, used as the fallback for records missing their own
    pub fn envelope_uuid(&self) -> Option<&str> {
        match self {
            BookMessage::Envelope { uuid, .. } if !uuid.is_empty() => Some(uuid),
            _ => None,
        }
    }
}

/// Price stream message: per-asset prices and display names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceMessage {
    pub price: HashMap<i64, f64>,
    pub subnet_name: HashMap<i64, String>,
    pub tao_in: HashMap<i64, f64>,
    pub alpha_in: HashMap<i64, f64>,
}

impl PriceMessage {
    /// Requires at least a `price` or `subnet_name` object
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        if !obj.get("price").is_some_and(Value::is_object)
            && !obj.get("subnet_name").is_some_and(Value::is_object)
        {
            return None;
        }

        Some(Self {
            price: numeric_map(obj, "price"),
            subnet_name: string_map(obj, "subnet_name"),
            tao_in: numeric_map(obj, "tao_in"),
            alpha_in: numeric_map(obj, "alpha_in"),
        })
    }
}

/// Tap stream message: live fill progress for one escrow
#[derive(Debug, Clone, PartialEq)]
pub struct TapMessage {
    pub escrow: String,
    pub tao: Option<f64>,
    pub alpha: Option<f64>,
    pub price: Option<f64>,
}

impl TapMessage {
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let escrow = obj.get("escrow")?.as_str()?.trim();
        if escrow.is_empty() {
            return None;
        }

        Some(Self {
            escrow: escrow.to_string(),
            tao: number(obj.get("tao")),
            alpha: number(obj.get("alpha")),
            price: number(obj.get("price")),
        })
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Asset-keyed object; entries with a non-integer key or value are skipped
fn numeric_map(obj: &Map<String, Value>, key: &str) -> HashMap<i64, f64> {
    let Some(Value::Object(entries)) = obj.get(key) else {
        return HashMap::new();
    };
    entries
        .iter()
        .filter_map(|(asset, v)| Some((asset.trim().parse().ok()?, number(Some(v))?)))
        .collect()
}

fn string_map(obj: &Map<String, Value>, key: &str) -> HashMap<i64, String> {
    let Some(Value::Object(entries)) = obj.get(key) else {
        return HashMap::new();
    };
    entries
        .iter()
        .filter_map(|(asset, v)| Some((asset.trim().parse().ok()?, v.as_str()?.to_string())))
        .collect()
}
