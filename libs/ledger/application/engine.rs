//! Ledger engine
//!
//! The single writer of ledger state. A tokio task owns the [`Reconciler`]
//! and consumes [`EngineEvent`]s from one unbounded channel. Stream handlers,
//! batch throttlers and highlight timers are producers that only ever post
//! events; none of them touch canonical state directly.
//!
//! After every mutation the writer projects a fresh [`LedgerView`] and
//! publishes it through a `watch` channel.
//!
//! ```text
//! book feed  ─────────────────────────────┐
//! price feed → BatchThrottler (200ms) ────┤
//! tap feed   → BatchThrottler (200ms) ────┼→ mpsc → writer task → watch<LedgerView>
//! highlight timers (3500ms) ──────────────┤
//! snapshot loader ────────────────────────┘
//! ```

use super::highlight::HighlightTracker;
use super::projector::{project, LedgerView};
use super::reconciler::{AssetQuote, Reconciler, TapProgress};
use super::throttle::BatchThrottler;
use crate::domain::{BookMessage, Order, PriceMessage, TapMessage};
use crate::error::{LedgerError, Result};
use crate::infrastructure::config::LedgerConfig;
use crate::infrastructure::feeds::{FeedKind, FeedSet, FeedStates};
use crate::infrastructure::rest::LedgerRestClient;
use feedsockets::Metrics;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Everything that can mutate ledger state
#[derive(Debug, Clone)]
pub enum EngineEvent {
    SnapshotLoaded(Vec<Order>),
    SnapshotFailed(String),
    BookDelta(BookMessage),
    PriceBatch(HashMap<i64, AssetQuote>),
    TapBatch(HashMap<String, TapProgress>),
    HighlightExpired(String),
    SetWalletFilter(Option<String>),
    Shutdown,
}

/// Producer side shared by the stream handlers
///
/// Book deltas go straight to the writer; price and tap updates go through
/// their throttlers.
#[derive(Clone)]
pub struct Ingest {
    events: mpsc::UnboundedSender<EngineEvent>,
    prices: BatchThrottler<i64, AssetQuote>,
    taps: BatchThrottler<String, TapProgress>,
}

impl Ingest {
    pub fn book(&self, message: BookMessage) -> Result<()> {
        self.events
            .send(EngineEvent::BookDelta(message))
            .map_err(|e| LedgerError::Channel(e.to_string()))
    }

    /// One throttled update per asset mentioned in the message
    pub fn price(&self, message: PriceMessage) {
        let PriceMessage {
            price,
            mut subnet_name,
            tao_in,
            alpha_in,
        } = message;

        let mut assets: HashSet<i64> = price.keys().copied().collect();
        assets.extend(subnet_name.keys().copied());
        assets.extend(tao_in.keys().copied());
        assets.extend(alpha_in.keys().copied());

        for asset in assets {
            self.prices.push(
                asset,
                AssetQuote {
                    price: price.get(&asset).copied(),
                    name: subnet_name.remove(&asset),
                    tao_in: tao_in.get(&asset).copied(),
                    alpha_in: alpha_in.get(&asset).copied(),
                },
            );
        }
    }

    pub fn tap(&self, message: TapMessage) {
        self.taps.push(
            message.escrow,
            TapProgress {
                tao: message.tao,
                alpha: message.alpha,
                price: message.price,
            },
        );
    }
}

/// Writer task state
pub struct LedgerEngine {
    reconciler: Reconciler,
    wallet_filter: Option<String>,
    initial_load_complete: bool,
    revision: u64,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    views: watch::Sender<Arc<LedgerView>>,
}

impl LedgerEngine {
    /// Start the writer task with no network attached
    ///
    /// Must be called from within a tokio runtime. Events can be posted via
    /// [`LedgerHandle::ingest`] and [`LedgerHandle::send`].
    pub fn spawn(wallet_filter: Option<String>) -> LedgerHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let runtime = Handle::current();

        let expired_tx = events_tx.clone();
        let highlights = HighlightTracker::with_notifier(move |key| {
            let _ = expired_tx.send(EngineEvent::HighlightExpired(key.to_string()));
        });

        let price_tx = events_tx.clone();
        let prices = BatchThrottler::new("PriceThrottle", runtime.clone(), move |batch| {
            let _ = price_tx.send(EngineEvent::PriceBatch(batch));
        });

        let tap_tx = events_tx.clone();
        let taps = BatchThrottler::new("TapThrottle", runtime, move |batch| {
            let _ = tap_tx.send(EngineEvent::TapBatch(batch));
        });

        let reconciler = Reconciler::new(highlights.clone());
        let initial = project(&reconciler, wallet_filter.as_deref(), false, 0);
        let (views_tx, views_rx) = watch::channel(Arc::new(initial));

        let engine = LedgerEngine {
            reconciler,
            wallet_filter,
            initial_load_complete: false,
            revision: 0,
            events: events_rx,
            views: views_tx,
        };
        let writer = tokio::spawn(engine.run());

        LedgerHandle {
            ingest: Ingest {
                events: events_tx,
                prices,
                taps,
            },
            views: views_rx,
            highlights,
            feeds: None,
            writer: Some(writer),
        }
    }

    /// Full startup: writer, snapshot, then the three streams
    ///
    /// The snapshot is posted before any stream connects so deltas always
    /// apply on top of it. A failed snapshot leaves the ledger empty but
    /// still marks the initial load complete.
    pub async fn start(config: &LedgerConfig) -> Result<LedgerHandle> {
        let mut handle = Self::spawn(config.wallet.clone());

        let rest = LedgerRestClient::new(&config.api)?;
        match rest.fetch_snapshot().await {
            Ok(orders) => {
                info!("[Engine] Snapshot loaded: {} orders", orders.len());
                handle.send(EngineEvent::SnapshotLoaded(orders))?;
            }
            Err(e) => {
                warn!("[Engine] Snapshot failed, starting empty: {}", e);
                handle.send(EngineEvent::SnapshotFailed(e.to_string()))?;
            }
        }

        handle.feeds = Some(FeedSet::connect(&config.streams, handle.ingest())?);
        info!("[Engine] Streams connecting");
        Ok(handle)
    }

    async fn run(mut self) {
        debug!("[Engine] Writer started");
        while let Some(event) = self.events.recv().await {
            if matches!(event, EngineEvent::Shutdown) {
                break;
            }
            if self.apply(event) {
                self.publish();
            }
        }
        debug!("[Engine] Writer stopped at revision {}", self.revision);
    }

    fn apply(&mut self, event: EngineEvent) -> bool {
        match event {
            EngineEvent::SnapshotLoaded(orders) => {
                self.reconciler.apply_snapshot(orders);
                self.initial_load_complete = true;
                true
            }
            EngineEvent::SnapshotFailed(reason) => {
                debug!("[Engine] Initial load finished without data: {}", reason);
                self.reconciler.apply_snapshot(Vec::new());
                self.initial_load_complete = true;
                true
            }
            EngineEvent::BookDelta(message) => self.reconciler.apply_book_delta(message),
            EngineEvent::PriceBatch(batch) => self.reconciler.apply_price_batch(batch),
            EngineEvent::TapBatch(batch) => self.reconciler.apply_tap_batch(batch),
            EngineEvent::HighlightExpired(key) => {
                // The timer already removed the key; the view still lists it
                self.reconciler.expire_highlight(&key);
                true
            }
            EngineEvent::SetWalletFilter(wallet) => {
                let wallet = wallet.filter(|w| !w.is_empty());
                let changed = self.wallet_filter != wallet;
                self.wallet_filter = wallet;
                changed
            }
            EngineEvent::Shutdown => false,
        }
    }

    fn publish(&mut self) {
        self.revision += 1;
        let view = project(
            &self.reconciler,
            self.wallet_filter.as_deref(),
            self.initial_load_complete,
            self.revision,
        );
        self.views.send_replace(Arc::new(view));
    }
}

/// Consumer-side handle to a running engine
pub struct LedgerHandle {
    ingest: Ingest,
    views: watch::Receiver<Arc<LedgerView>>,
    highlights: HighlightTracker,
    feeds: Option<FeedSet>,
    writer: Option<JoinHandle<()>>,
}

impl LedgerHandle {
    /// Latest published view
    pub fn view(&self) -> Arc<LedgerView> {
        Arc::clone(&self.views.borrow())
    }

    /// Receiver notified on every republish
    pub fn subscribe(&self) -> watch::Receiver<Arc<LedgerView>> {
        self.views.clone()
    }

    pub fn ingest(&self) -> Ingest {
        self.ingest.clone()
    }

    pub fn send(&self, event: EngineEvent) -> Result<()> {
        self.ingest
            .events
            .send(event)
            .map_err(|e| LedgerError::Channel(e.to_string()))
    }

    pub fn set_wallet_filter(&self, wallet: Option<String>) -> Result<()> {
        self.send(EngineEvent::SetWalletFilter(wallet))
    }

    /// Apply pending price and tap updates without waiting for the timer
    pub fn flush_throttles(&self) {
        self.ingest.prices.flush();
        self.ingest.taps.flush();
    }

    /// `None` when the engine runs without streams
    pub fn feed_states(&self) -> Option<FeedStates> {
        self.feeds.as_ref().map(FeedSet::states)
    }

    pub fn feed_metrics(&self, kind: FeedKind) -> Option<Metrics> {
        self.feeds.as_ref().map(|feeds| feeds.metrics(kind))
    }

    /// Ask one stream to reconnect, e.g. after it exhausted its retries
    pub fn reconnect_feed(&self, kind: FeedKind) -> Result<()> {
        match &self.feeds {
            Some(feeds) => feeds.reconnect(kind),
            None => Err(LedgerError::Channel(format!("{} stream not connected", kind))),
        }
    }

    /// Stop streams, then timers, then the writer
    pub async fn shutdown(mut self) -> Result<()> {
        // Handler threads are joined here, so nothing pushes after the cancel
        if let Some(feeds) = self.feeds.take() {
            feeds.shutdown().await;
        }
        self.ingest.prices.cancel();
        self.ingest.taps.cancel();

        let _ = self.ingest.events.send(EngineEvent::Shutdown);
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.await {
                warn!("[Engine] Writer task ended abnormally: {}", e);
            }
        }

        self.highlights.cancel_all();
        info!("[Engine] Shutdown complete");
        Ok(())
    }
}

impl Drop for LedgerHandle {
    fn drop(&mut self) {
        if self.writer.is_some() {
            drop(self.feeds.take());
            self.ingest.prices.cancel();
            self.ingest.taps.cancel();
            self.highlights.cancel_all();
            let _ = self.ingest.events.send(EngineEvent::Shutdown);
        }
    }
}
