//! REST client for the ledger service
//!
//! Two calls: the one-shot startup snapshot and the order mutation sink used
//! by collaborators to submit, modify and cancel orders.

use super::config::ApiConfig;
use crate::domain::decoder::decode_text;
use crate::domain::Order;
use crate::error::{LedgerError, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct LedgerRestClient {
    base_url: String,
    snapshot_limit: usize,
    order_path: String,
    client: Client,
}

impl LedgerRestClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(5)
            .tcp_keepalive(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            snapshot_limit: config.snapshot_limit,
            order_path: config.order_path.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch and normalize the current ledger
    ///
    /// The body is a JSON array of order records, possibly wrapped in a JSON
    /// string. Records without a uuid are skipped; the result is capped at the
    /// configured limit.
    pub async fn fetch_snapshot(&self) -> Result<Vec<Order>> {
        let url = format!("{}/sql", self.base_url);
        debug!("GET {}?limit={}", url, self.snapshot_limit);

        let response = self
            .client
            .get(&url)
            .query(&[("limit", self.snapshot_limit)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        let records = match decode_text(&body) {
            Some(Value::Array(records)) => records,
            Some(other) => {
                return Err(LedgerError::Decode(format!(
                    "snapshot body is not an array (got {})",
                    json_kind(&other)
                )))
            }
            None => return Err(LedgerError::Decode("snapshot body is not JSON".into())),
        };

        let total = records.len();
        let mut orders: Vec<Order> = records
            .iter()
            .filter_map(|raw| Order::normalize(raw, None))
            .collect();

        if orders.len() < total {
            warn!("[Snapshot] Skipped {} records without a uuid", total - orders.len());
        }
        orders.truncate(self.snapshot_limit);
        info!("[Snapshot] {} orders", orders.len());
        Ok(orders)
    }

    /// POST a full order record; the response body is returned verbatim
    pub async fn submit_order(&self, order: &Order) -> Result<String> {
        let url = format!("{}{}", self.base_url, self.order_path);
        debug!("POST {} uuid={} status={}", url, order.uuid, order.status);

        let response = self
            .client
            .post(&url)
            .json(&order.to_record())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.text().await?)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
