//! View projector
//!
//! Pure function from reconciler state to the read-only [`LedgerView`]
//! handed to consumers. Recomputed after every mutation; consumers only ever
//! hold immutable snapshots.

use super::reconciler::{Reconciler, TapProgress};
use crate::domain::{Order, OrderType};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default)]
pub struct LedgerView {
    /// Open, public rows in canonical (newest first) order
    pub open_orders: Vec<Order>,
    /// Filled and closed rows grouped by origin (or uuid), date descending
    pub history: BTreeMap<String, Vec<Order>>,
    /// Open orders, or the wallet's rows de-duplicated by uuid when a
    /// wallet filter is active
    pub feed: Vec<Order>,
    pub prices: HashMap<i64, f64>,
    pub asset_names: HashMap<i64, String>,
    /// Per-asset pool reserves from the price stream
    pub tao_in: HashMap<i64, f64>,
    pub alpha_in: HashMap<i64, f64>,
    pub taps: HashMap<String, TapProgress>,
    pub highlights: HashMap<String, OrderType>,
    pub wallet_filter: Option<String>,
    /// Set once the startup snapshot finished, successfully or not
    pub initial_load_complete: bool,
    pub revision: u64,
}

impl LedgerView {
    pub fn is_highlighted(&self, order: &Order) -> bool {
        self.highlights.contains_key(&order.highlight_key())
    }

    pub fn history_for(&self, parent: &str) -> &[Order] {
        self.history.get(parent).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn asset_name(&self, asset: i64) -> Option<&str> {
        self.asset_names.get(&asset).map(String::as_str)
    }
}

pub fn project(
    reconciler: &Reconciler,
    wallet_filter: Option<&str>,
    initial_load_complete: bool,
    revision: u64,
) -> LedgerView {
    let rows = reconciler.orders();

    let open_orders: Vec<Order> = rows
        .iter()
        .filter(|o| o.is_open() && o.public)
        .map(|o| (*o).clone())
        .collect();

    let mut history: BTreeMap<String, Vec<Order>> = BTreeMap::new();
    for order in rows.iter().filter(|o| o.status.is_history()) {
        history
            .entry(order.parent_key().to_string())
            .or_default()
            .push((*order).clone());
    }
    for group in history.values_mut() {
        group.sort_by(|a, b| b.date.cmp(&a.date));
    }

    let feed = match wallet_filter {
        Some(wallet) => wallet_feed(&rows, wallet),
        None => open_orders.clone(),
    };

    LedgerView {
        open_orders,
        history,
        feed,
        prices: reconciler.prices().clone(),
        asset_names: reconciler.asset_names().clone(),
        tao_in: reconciler.tao_in().clone(),
        alpha_in: reconciler.alpha_in().clone(),
        taps: reconciler.taps().clone(),
        highlights: reconciler.highlights().snapshot(),
        wallet_filter: wallet_filter.map(str::to_string),
        initial_load_complete,
        revision,
    }
}

/// The wallet's rows, one per uuid (latest date wins), date descending
fn wallet_feed(rows: &[&Order], wallet: &str) -> Vec<Order> {
    let mut latest: HashMap<&str, &Order> = HashMap::new();
    for &order in rows.iter().filter(|o| o.wallet == wallet) {
        latest
            .entry(order.uuid.as_str())
            .and_modify(|held| {
                if order.date > held.date {
                    *held = order;
                }
            })
            .or_insert(order);
    }

    // Walk canonical order so equal dates keep newest-first placement
    let mut feed: Vec<Order> = rows
        .iter()
        .copied()
        .filter(|&o| {
            latest
                .get(o.uuid.as_str())
                .is_some_and(|&held| std::ptr::eq(held, o))
        })
        .cloned()
        .collect();
    feed.sort_by(|a, b| b.date.cmp(&a.date));
    feed
}
