//! Order model and wire-record normalization
//!
//! The server serializes orders inconsistently: numbers may arrive as
//! strings, booleans as `"True"` or `1`, timestamps in several formats.
//! [`Order::normalize`] is the only way raw records become [`Order`]s, so the
//! rest of the engine sees a single canonical shape.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

// =============================================================================
// Enums
// =============================================================================

/// Lifecycle status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created but not yet live (wire codes -1 and 0)
    Init,
    Open,
    Filled,
    Closed,
    Error,
    Stopped,
    Expired,
}

impl OrderStatus {
    /// Unknown codes normalize to `Init`
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => OrderStatus::Open,
            2 => OrderStatus::Filled,
            3 => OrderStatus::Closed,
            4 => OrderStatus::Error,
            5 => OrderStatus::Stopped,
            6 => OrderStatus::Expired,
            _ => OrderStatus::Init,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            OrderStatus::Init => 0,
            OrderStatus::Open => 1,
            OrderStatus::Filled => 2,
            OrderStatus::Closed => 3,
            OrderStatus::Error => 4,
            OrderStatus::Stopped => 5,
            OrderStatus::Expired => 6,
        }
    }

    /// Closed, Error and Expired orders never return to trading
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Closed | OrderStatus::Error | OrderStatus::Expired
        )
    }

    /// Statuses shown in the filled/closed history
    pub fn is_history(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Closed)
    }

    /// Rows a terminal update supersedes: everything still tradeable
    pub fn is_live(&self) -> bool {
        !self.is_terminal() && *self != OrderStatus::Filled
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Init => "INIT",
            OrderStatus::Open => "OPEN",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Closed => "CLOSED",
            OrderStatus::Error => "ERROR",
            OrderStatus::Stopped => "STOPPED",
            OrderStatus::Expired => "EXPIRED",
        };
        f.write_str(name)
    }
}

/// Side of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Sell,
    Buy,
}

impl OrderType {
    /// Code 1 is a sell; anything else is treated as a buy
    pub fn from_code(code: i64) -> Self {
        if code == 1 {
            OrderType::Sell
        } else {
            OrderType::Buy
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            OrderType::Sell => 1,
            OrderType::Buy => 2,
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Sell => write!(f, "SELL"),
            OrderType::Buy => write!(f, "BUY"),
        }
    }
}

/// Order expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gtd {
    GoodTillCancel,
    Until(DateTime<Utc>),
}

impl Gtd {
    const GOOD_TILL_CANCEL: &'static str = "good-till-cancel";

    fn parse(value: Option<&Value>) -> Self {
        let Some(value) = value else {
            return Gtd::GoodTillCancel;
        };
        match value {
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty()
                    || s.eq_ignore_ascii_case(Self::GOOD_TILL_CANCEL)
                    || s.eq_ignore_ascii_case("gtc")
                {
                    Gtd::GoodTillCancel
                } else {
                    parse_timestamp(value).map_or(Gtd::GoodTillCancel, Gtd::Until)
                }
            }
            Value::Number(_) => parse_timestamp(value).map_or(Gtd::GoodTillCancel, Gtd::Until),
            _ => Gtd::GoodTillCancel,
        }
    }

    fn to_wire(self) -> String {
        match self {
            Gtd::GoodTillCancel => Self::GOOD_TILL_CANCEL.to_string(),
            Gtd::Until(at) => at.to_rfc3339(),
        }
    }
}

// =============================================================================
// Effective key
// =============================================================================

/// Identity of one ledger row: `(uuid, status, escrow)`
///
/// One logical order may hold several rows at once, e.g. an open row and a
/// filled row produced by a partial fill.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrderKey {
    pub uuid: String,
    pub status: OrderStatus,
    pub escrow: String,
}

impl fmt::Display for OrderKey {
    /// `uuid-status-escrow`, the highlight key format
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.uuid, self.status.code(), self.escrow)
    }
}

// =============================================================================
// Order
// =============================================================================

/// Canonical, normalized order row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub uuid: String,
    pub date: DateTime<Utc>,
    pub origin: String,
    pub escrow: String,
    pub wallet: String,
    pub asset: i64,
    pub order_type: OrderType,
    pub ask: f64,
    pub bid: f64,
    /// Stop price
    pub stp: f64,
    /// Limit price
    pub lmt: f64,
    pub gtd: Gtd,
    pub partial: bool,
    pub public: bool,
    pub status: OrderStatus,
    /// Live fill progress: tao leg
    pub tao: f64,
    /// Live fill progress: alpha leg
    pub alpha: f64,
    /// Live fill progress: execution price
    pub price: f64,
    /// Fill progress exactly as the record stated it, before derivation
    #[serde(skip)]
    pub reported: ReportedProgress,
}

/// Explicit `tao`/`alpha`/`price` fields of a raw record, clamped at zero
///
/// `None` means the record did not carry the field and the figure on the
/// order was derived from `bid`/`ask`/`stp`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReportedProgress {
    pub tao: Option<f64>,
    pub alpha: Option<f64>,
    pub price: Option<f64>,
}

impl Order {
    /// Build a canonical order from a raw wire record
    ///
    /// `fallback_uuid` is used when the record carries no uuid of its own
    /// (the envelope uuid of a batch delta). Returns `None` for non-objects
    /// and for records whose uuid is still empty.
    pub fn normalize(raw: &Value, fallback_uuid: Option<&str>) -> Option<Self> {
        let obj = raw.as_object()?;

        let mut uuid = str_field(obj, "uuid");
        if uuid.is_empty() {
            uuid = fallback_uuid.map(str::trim).unwrap_or_default().to_string();
        }
        if uuid.is_empty() {
            return None;
        }

        let ask = non_negative(num_field(obj, "ask"));
        let bid = non_negative(num_field(obj, "bid"));
        let stp = non_negative(num_field(obj, "stp"));
        let reported = ReportedProgress {
            tao: finite_non_negative(num_field(obj, "tao")),
            alpha: finite_non_negative(num_field(obj, "alpha")),
            price: finite_non_negative(num_field(obj, "price")),
        };

        Some(Self {
            uuid,
            date: obj.get("date").and_then(parse_timestamp).unwrap_or_default(),
            origin: str_field(obj, "origin"),
            escrow: str_field(obj, "escrow"),
            wallet: str_field(obj, "wallet"),
            asset: int_field(obj, "asset").unwrap_or(0),
            order_type: OrderType::from_code(int_field(obj, "type").unwrap_or(0)),
            ask,
            bid,
            stp,
            lmt: non_negative(num_field(obj, "lmt")),
            gtd: Gtd::parse(obj.get("gtd")),
            partial: bool_field(obj, "partial"),
            public: bool_field(obj, "public"),
            status: OrderStatus::from_code(int_field(obj, "status").unwrap_or(0)),
            tao: positive_or(reported.tao, bid),
            alpha: positive_or(reported.alpha, ask),
            price: positive_or(reported.price, stp),
            reported,
        })
    }

    pub fn key(&self) -> OrderKey {
        OrderKey {
            uuid: self.uuid.clone(),
            status: self.status,
            escrow: self.escrow.clone(),
        }
    }

    pub fn highlight_key(&self) -> String {
        self.key().to_string()
    }

    /// Grouping key of the history projection: `origin`, else `uuid`
    pub fn parent_key(&self) -> &str {
        if self.origin.is_empty() {
            &self.uuid
        } else {
            &self.origin
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    /// Combine an incoming update with the row it replaces
    ///
    /// Every field comes from `incoming` except the fill-progress figures,
    /// which keep the existing value unless the incoming one is strictly
    /// positive. A server-side recompute can briefly report zero. An
    /// explicitly reported zero counts as zero even when `bid`/`ask`/`stp`
    /// would derive something positive.
    pub fn merged(existing: &Order, incoming: Order) -> Order {
        let reported = incoming.reported;
        Order {
            tao: prefer_positive(reported.tao.unwrap_or(incoming.tao), existing.tao),
            alpha: prefer_positive(reported.alpha.unwrap_or(incoming.alpha), existing.alpha),
            price: prefer_positive(reported.price.unwrap_or(incoming.price), existing.price),
            ..incoming
        }
    }

    /// Full wire record, as accepted by the order mutation endpoint
    pub fn to_record(&self) -> Value {
        json!({
            "uuid": self.uuid,
            "date": self.date.to_rfc3339(),
            "origin": self.origin,
            "escrow": self.escrow,
            "wallet": self.wallet,
            "asset": self.asset,
            "type": self.order_type.code(),
            "ask": self.ask,
            "bid": self.bid,
            "stp": self.stp,
            "lmt": self.lmt,
            "gtd": self.gtd.to_wire(),
            "partial": self.partial,
            "public": self.public,
            "status": self.status.code(),
        })
    }
}

// =============================================================================
// Field coercion
// =============================================================================

fn str_field(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn num_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn int_field(obj: &Map<String, Value>, key: &str) -> Option<i64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> bool {
    match obj.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64() == Some(1.0),
        Some(Value::String(s)) => matches!(s.trim(), "true" | "True" | "TRUE" | "1"),
        _ => false,
    }
}

/// Finite, clamped at zero; anything unusable becomes 0
fn non_negative(value: Option<f64>) -> f64 {
    value
        .filter(|v| v.is_finite())
        .map(|v| v.max(0.0))
        .unwrap_or(0.0)
}

fn finite_non_negative(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite()).map(|v| v.max(0.0))
}

fn positive_or(value: Option<f64>, fallback: f64) -> f64 {
    match value {
        Some(v) if v > 0.0 => v,
        _ => fallback,
    }
}

fn prefer_positive(incoming: f64, existing: f64) -> f64 {
    if incoming > 0.0 {
        incoming
    } else {
        existing
    }
}

/// Accepts RFC 3339, naive `YYYY-MM-DD HH:MM:SS[.f]` (taken as UTC), and
/// unix seconds or milliseconds as a number or numeric string
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().and_then(from_unix),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }
            s.parse::<f64>().ok().and_then(from_unix)
        }
        _ => None,
    }
}

fn from_unix(raw: f64) -> Option<DateTime<Utc>> {
    if !raw.is_finite() || raw < 0.0 {
        return None;
    }
    // Anything past ~year 33658 in seconds is really milliseconds
    let millis = if raw > 1e12 { raw } else { raw * 1000.0 };
    Utc.timestamp_millis_opt(millis as i64).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(extra: Value) -> Value {
        let mut base = json!({
            "uuid": "A",
            "date": "2024-01-01T00:00:00Z",
            "origin": "",
            "escrow": "5Escrow",
            "wallet": "5Wallet",
            "asset": 3,
            "type": 1,
            "ask": 10.0,
            "bid": 2.5,
            "stp": 0.25,
            "lmt": 0.3,
            "gtd": "good-till-cancel",
            "partial": false,
            "public": true,
            "status": 1
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        base
    }

    #[test]
    fn test_normalize_full_record() {
        let order = Order::normalize(&raw(json!({})), None).unwrap();

        assert_eq!(order.uuid, "A");
        assert_eq!(order.asset, 3);
        assert_eq!(order.order_type, OrderType::Sell);
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.gtd, Gtd::GoodTillCancel);
        assert!(order.public);
        assert!(!order.partial);
        // Fill progress derives from bid/ask/stp when not given explicitly
        assert_eq!(order.tao, 2.5);
        assert_eq!(order.alpha, 10.0);
        assert_eq!(order.price, 0.25);
        assert_eq!(order.date.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_boolean_coercion() {
        for truthy in [json!("True"), json!("true"), json!(1), json!(true)] {
            let order = Order::normalize(&raw(json!({ "public": truthy })), None).unwrap();
            assert!(order.public, "{:?} should be truthy", truthy);
        }
        for falsy in [json!("False"), json!(0), json!(null), json!("yes")] {
            let order = Order::normalize(&raw(json!({ "public": falsy })), None).unwrap();
            assert!(!order.public, "{:?} should be falsy", falsy);
        }
    }

    #[test]
    fn test_numeric_fields_clamped_non_negative() {
        let order = Order::normalize(
            &raw(json!({ "ask": -4, "bid": "7.5", "stp": "NaN", "lmt": "junk" })),
            None,
        )
        .unwrap();

        assert_eq!(order.ask, 0.0);
        assert_eq!(order.bid, 7.5);
        assert_eq!(order.stp, 0.0);
        assert_eq!(order.lmt, 0.0);
    }

    #[test]
    fn test_uuid_fallback_and_rejection() {
        let no_uuid = raw(json!({ "uuid": "" }));
        assert!(Order::normalize(&no_uuid, None).is_none());

        let order = Order::normalize(&no_uuid, Some("envelope")).unwrap();
        assert_eq!(order.uuid, "envelope");

        assert!(Order::normalize(&json!([1, 2]), Some("x")).is_none());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(OrderStatus::from_code(-1), OrderStatus::Init);
        assert_eq!(OrderStatus::from_code(0), OrderStatus::Init);
        assert_eq!(OrderStatus::from_code(6), OrderStatus::Expired);
        assert_eq!(OrderStatus::from_code(42), OrderStatus::Init);

        assert!(OrderStatus::Closed.is_terminal());
        assert!(OrderStatus::Error.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());
        assert!(!OrderStatus::Filled.is_terminal());
        assert!(!OrderStatus::Stopped.is_terminal());
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(parse_timestamp(&json!("2024-01-01T00:00:00Z")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2024-01-01 00:00:00")), Some(expected));
        assert_eq!(parse_timestamp(&json!(1704067200)), Some(expected));
        assert_eq!(parse_timestamp(&json!(1704067200000i64)), Some(expected));
        assert_eq!(parse_timestamp(&json!("1704067200")), Some(expected));
        assert_eq!(parse_timestamp(&json!("not a date")), None);
    }

    #[test]
    fn test_gtd_parsing() {
        let until = Order::normalize(&raw(json!({ "gtd": "2024-06-01T12:00:00Z" })), None).unwrap();
        assert!(matches!(until.gtd, Gtd::Until(_)));

        let gtc = Order::normalize(&raw(json!({ "gtd": "good-till-cancel" })), None).unwrap();
        assert_eq!(gtc.gtd, Gtd::GoodTillCancel);
    }

    #[test]
    fn test_merge_keeps_known_good_progress() {
        let existing = Order::normalize(&raw(json!({ "tao": 5.0 })), None).unwrap();
        let zero = Order::normalize(&raw(json!({ "tao": 0, "bid": 0, "lmt": 0.9 })), None).unwrap();

        let merged = Order::merged(&existing, zero);
        assert_eq!(merged.tao, 5.0);
        assert_eq!(merged.lmt, 0.9);

        let seven = Order::normalize(&raw(json!({ "tao": 7.0 })), None).unwrap();
        assert_eq!(Order::merged(&merged, seven).tao, 7.0);
    }

    #[test]
    fn test_reported_zero_does_not_fall_back_to_bid() {
        let existing = Order::normalize(&raw(json!({ "bid": 2, "tao": 5 })), None).unwrap();
        assert_eq!(existing.tao, 5.0);

        let zero = Order::normalize(&raw(json!({ "bid": 2, "tao": 0 })), None).unwrap();
        // On its own the record still shows the derived figure
        assert_eq!(zero.tao, 2.0);
        assert_eq!(zero.reported.tao, Some(0.0));
        assert_eq!(Order::merged(&existing, zero).tao, 5.0);

        // Without an explicit field the derived figure is the incoming value
        let mut derived = raw(json!({ "bid": 3 }));
        derived.as_object_mut().unwrap().remove("tao");
        let derived = Order::normalize(&derived, None).unwrap();
        assert_eq!(derived.reported.tao, None);
        assert_eq!(Order::merged(&existing, derived).tao, 3.0);
    }

    #[test]
    fn test_keys() {
        let order = Order::normalize(&raw(json!({ "origin": "P" })), None).unwrap();
        assert_eq!(order.highlight_key(), "A-1-5Escrow");
        assert_eq!(order.parent_key(), "P");

        let orphan = Order::normalize(&raw(json!({})), None).unwrap();
        assert_eq!(orphan.parent_key(), "A");
    }

    #[test]
    fn test_record_round_trip_keeps_identity() {
        let order = Order::normalize(&raw(json!({})), None).unwrap();
        let record = order.to_record();
        assert_eq!(record["gtd"], "good-till-cancel");

        let again = Order::normalize(&record, None).unwrap();
        assert_eq!(again.key(), order.key());
        assert_eq!(again.date, order.date);
        assert_eq!(again.gtd, Gtd::GoodTillCancel);

        let until = Order::normalize(&raw(json!({ "gtd": "2024-06-01T12:00:00Z" })), None).unwrap();
        assert_eq!(until.to_record()["gtd"], "2024-06-01T12:00:00+00:00");
    }
}
