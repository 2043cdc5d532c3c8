//! Order reconciler
//!
//! Owns the canonical order set and the price, name and tap mappings. It is
//! synchronous and single-owner: the engine's writer task is the only caller,
//! so no locking happens here.
//!
//! ## Identity
//!
//! Rows are keyed by [`OrderKey`] `(uuid, status, escrow)`. One logical
//! order may have several rows (an open remainder and a filled part). Each
//! row carries a sequence number; higher means newer, and canonical
//! iteration is newest first.
//!
//! ## Transitions
//!
//! An update whose exact key is already present is merged in place. An
//! update for a known uuid under a different status is a lifecycle
//! transition: the rows it supersedes are removed and the new row goes to
//! the front. A row is superseded when
//!
//! - the update is terminal and the row is still live, or
//! - the update is non-terminal and shares the row's escrow (or carries
//!   none).
//!
//! The second rule keeps the filled part of a partial fill next to the open
//! remainder, since those two rows have different escrows.
//!
//! Batch (array) deltas are simpler: a terminal element drops every row of
//! its uuid, anything else is upserted by exact key.

use super::highlight::HighlightTracker;
use crate::domain::{BookMessage, Order, OrderKey, OrderPayload};
use std::collections::HashMap;
use tracing::{debug, trace};

/// One price-stream update for an asset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetQuote {
    pub price: Option<f64>,
    pub name: Option<String>,
    /// Pool reserves on each side
    pub tao_in: Option<f64>,
    pub alpha_in: Option<f64>,
}

/// Live fill progress for one escrow
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TapProgress {
    pub tao: Option<f64>,
    pub alpha: Option<f64>,
    pub price: Option<f64>,
}

#[derive(Debug, Clone)]
struct Entry {
    order: Order,
    seq: u64,
}

pub struct Reconciler {
    orders: HashMap<OrderKey, Entry>,
    next_seq: u64,
    prices: HashMap<i64, f64>,
    asset_names: HashMap<i64, String>,
    tao_in: HashMap<i64, f64>,
    alpha_in: HashMap<i64, f64>,
    taps: HashMap<String, TapProgress>,
    highlights: HighlightTracker,
}

impl Reconciler {
    pub fn new(highlights: HighlightTracker) -> Self {
        Self {
            orders: HashMap::new(),
            next_seq: 0,
            prices: HashMap::new(),
            asset_names: HashMap::new(),
            tao_in: HashMap::new(),
            alpha_in: HashMap::new(),
            taps: HashMap::new(),
            highlights,
        }
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Replace the canonical set wholesale
    ///
    /// The first element of `orders` becomes the newest row. Duplicate keys
    /// within the snapshot are merged into the first occurrence.
    pub fn apply_snapshot(&mut self, orders: Vec<Order>) {
        self.orders.clear();
        let count = orders.len() as u64;
        let base = self.next_seq;
        self.next_seq += count;

        for (i, order) in orders.into_iter().enumerate() {
            let key = order.key();
            match self.orders.get_mut(&key) {
                Some(entry) => entry.order = Order::merged(&entry.order, order),
                None => {
                    let seq = base + count - i as u64;
                    self.orders.insert(key, Entry { order, seq });
                }
            }
        }
        debug!("[Reconciler] Snapshot applied: {} rows", self.orders.len());
    }

    /// Apply one book-stream delta; returns whether canonical state changed
    pub fn apply_book_delta(&mut self, message: BookMessage) -> bool {
        match message {
            BookMessage::Flat(raw) => match Order::normalize(&raw, None) {
                Some(order) => self.apply_order(order),
                None => {
                    debug!("[Reconciler] Flat delta without uuid ignored");
                    false
                }
            },
            BookMessage::Envelope { uuid, data } => {
                let fallback = (!uuid.is_empty()).then_some(uuid.as_str());
                match data {
                    OrderPayload::Single(raw) => match Order::normalize(&raw, fallback) {
                        Some(order) => self.apply_order(order),
                        None => {
                            debug!("[Reconciler] Delta without uuid ignored");
                            false
                        }
                    },
                    OrderPayload::Batch(items) => {
                        let mut changed = false;
                        for raw in &items {
                            let Some(order) = Order::normalize(raw, fallback) else {
                                trace!("[Reconciler] Batch element without uuid skipped");
                                continue;
                            };
                            changed |= self.apply_batch_order(order);
                        }
                        changed
                    }
                }
            }
        }
    }

    /// Overwrite prices that are finite and positive, non-empty names, and
    /// reserves that are finite and non-negative
    pub fn apply_price_batch(&mut self, batch: HashMap<i64, AssetQuote>) -> bool {
        let mut changed = false;
        for (asset, quote) in batch {
            if let Some(price) = quote.price.filter(|p| p.is_finite() && *p > 0.0) {
                changed |= self.prices.insert(asset, price) != Some(price);
            }
            if let Some(tao) = quote.tao_in.filter(|v| v.is_finite() && *v >= 0.0) {
                changed |= self.tao_in.insert(asset, tao) != Some(tao);
            }
            if let Some(alpha) = quote.alpha_in.filter(|v| v.is_finite() && *v >= 0.0) {
                changed |= self.alpha_in.insert(asset, alpha) != Some(alpha);
            }
            if let Some(name) = quote.name.filter(|n| !n.is_empty()) {
                changed |= self.asset_names.get(&asset) != Some(&name);
                self.asset_names.insert(asset, name);
            }
        }
        changed
    }

    /// Record fill progress and copy it onto open rows with a matching escrow
    ///
    /// Tap data is authoritative, so no positivity guard applies here.
    pub fn apply_tap_batch(&mut self, batch: HashMap<String, TapProgress>) -> bool {
        let mut changed = false;
        for entry in self.orders.values_mut() {
            if !entry.order.is_open() {
                continue;
            }
            let Some(progress) = batch.get(&entry.order.escrow) else {
                continue;
            };
            let order = &mut entry.order;
            if let Some(tao) = progress.tao {
                order.tao = tao;
            }
            if let Some(alpha) = progress.alpha {
                order.alpha = alpha;
            }
            if let Some(price) = progress.price {
                order.price = price;
            }
            changed = true;
        }

        for (escrow, progress) in batch {
            changed |= self.taps.insert(escrow, progress) != Some(progress);
        }
        changed
    }

    /// Drop an expired highlight; returns whether it was still active
    pub fn expire_highlight(&mut self, key: &str) -> bool {
        self.highlights.remove(key)
    }

    // =========================================================================
    // Merge rules
    // =========================================================================

    fn apply_order(&mut self, order: Order) -> bool {
        let key = order.key();
        if let Some(entry) = self.orders.get_mut(&key) {
            let merged = Order::merged(&entry.order, order);
            let changed = merged != entry.order;
            entry.order = merged;
            return changed;
        }
        self.transition(order);
        true
    }

    /// Batch elements upsert, except terminal ones which drop the uuid
    fn apply_batch_order(&mut self, order: Order) -> bool {
        if order.status.is_terminal() {
            return self.remove_uuid(&order.uuid);
        }

        let key = order.key();
        if let Some(entry) = self.orders.get_mut(&key) {
            let merged = Order::merged(&entry.order, order);
            let changed = merged != entry.order;
            entry.order = merged;
            return changed;
        }

        if order.is_open() {
            self.highlights.register(order.highlight_key(), order.order_type);
        }
        self.insert_front(order);
        true
    }

    /// Insert a new row for a uuid, replacing the rows it supersedes
    fn transition(&mut self, order: Order) {
        let mut had_open = false;
        let mut superseded: Vec<(OrderKey, u64)> = Vec::new();
        for (key, entry) in &self.orders {
            if key.uuid != order.uuid {
                continue;
            }
            had_open |= entry.order.is_open();
            if supersedes(&order, &entry.order) {
                superseded.push((key.clone(), entry.seq));
            }
        }

        // The most recent superseded row guards the fill-progress figures
        superseded.sort_by(|a, b| b.1.cmp(&a.1));
        let mut order = order;
        let mut removed = Vec::with_capacity(superseded.len());
        for (key, _) in &superseded {
            if let Some(entry) = self.orders.remove(key) {
                removed.push(entry.order);
            }
        }
        if let Some(previous) = removed.first() {
            order = Order::merged(previous, order);
            debug!(
                "[Reconciler] {} {} -> {} ({} rows superseded)",
                order.uuid,
                previous.status,
                order.status,
                removed.len()
            );
        }

        if order.is_open() && !had_open {
            self.highlights.register(order.highlight_key(), order.order_type);
        }
        self.insert_front(order);
    }

    /// Drop every row of `uuid`; returns whether any existed
    fn remove_uuid(&mut self, uuid: &str) -> bool {
        let before = self.orders.len();
        self.orders.retain(|key, _| key.uuid != uuid);
        let removed = before - self.orders.len();
        if removed > 0 {
            debug!("[Reconciler] {} dropped by batch ({} rows)", uuid, removed);
        }
        removed > 0
    }

    fn insert_front(&mut self, order: Order) {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.orders.insert(order.key(), Entry { order, seq });
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Canonical rows, newest first
    pub fn orders(&self) -> Vec<&Order> {
        let mut entries: Vec<&Entry> = self.orders.values().collect();
        entries.sort_by(|a, b| b.seq.cmp(&a.seq));
        entries.into_iter().map(|e| &e.order).collect()
    }

    pub fn get(&self, key: &OrderKey) -> Option<&Order> {
        self.orders.get(key).map(|e| &e.order)
    }

    /// All rows sharing `uuid`, newest first
    pub fn rows_for(&self, uuid: &str) -> Vec<&Order> {
        self.orders()
            .into_iter()
            .filter(|o| o.uuid == uuid)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn prices(&self) -> &HashMap<i64, f64> {
        &self.prices
    }

    pub fn asset_names(&self) -> &HashMap<i64, String> {
        &self.asset_names
    }

    pub fn tao_in(&self) -> &HashMap<i64, f64> {
        &self.tao_in
    }

    pub fn alpha_in(&self) -> &HashMap<i64, f64> {
        &self.alpha_in
    }

    pub fn taps(&self) -> &HashMap<String, TapProgress> {
        &self.taps
    }

    pub fn highlights(&self) -> &HighlightTracker {
        &self.highlights
    }
}

fn supersedes(incoming: &Order, existing: &Order) -> bool {
    if incoming.status == existing.status {
        return false;
    }
    if incoming.status.is_terminal() {
        existing.status.is_live()
    } else {
        incoming.escrow.is_empty() || incoming.escrow == existing.escrow
    }
}
