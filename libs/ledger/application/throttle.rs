//! Batch throttler
//!
//! Coalesces rapid-fire keyed updates into one batch per flush interval.
//! The first push after an idle period arms a single flush timer; pushes
//! before it fires accumulate into the same pending map, last value wins per
//! key. At most one timer is outstanding per throttler.
//!
//! Pushes may come from any thread (the feed handlers run on plain OS
//! threads), so the throttler keeps a runtime handle to arm its timer.
//! Once cancelled, a throttler stays closed: later pushes are dropped and
//! never arm a timer.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::mem;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Fixed flush cadence
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(200);

type Sink<K, V> = Box<dyn Fn(HashMap<K, V>) + Send + Sync>;

struct State<K, V> {
    pending: HashMap<K, V>,
    timer: Option<JoinHandle<()>>,
    closed: bool,
}

struct Inner<K, V> {
    name: &'static str,
    interval: Duration,
    runtime: Handle,
    state: Mutex<State<K, V>>,
    sink: Sink<K, V>,
}

pub struct BatchThrottler<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for BatchThrottler<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> BatchThrottler<K, V>
where
    K: Eq + Hash + Send + 'static,
    V: Send + 'static,
{
    /// `sink` receives each non-empty batch
    pub fn new(
        name: &'static str,
        runtime: Handle,
        sink: impl Fn(HashMap<K, V>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                interval: FLUSH_INTERVAL,
                runtime,
                state: Mutex::new(State {
                    pending: HashMap::new(),
                    timer: None,
                    closed: false,
                }),
                sink: Box::new(sink),
            }),
        }
    }

    pub fn push(&self, key: K, value: V) {
        let mut state = self.inner.state.lock();
        if state.closed {
            trace!("[{}] Push after cancel dropped", self.inner.name);
            return;
        }
        state.pending.insert(key, value);

        if state.timer.is_none() {
            let weak: Weak<Inner<K, V>> = Arc::downgrade(&self.inner);
            let interval = self.inner.interval;
            state.timer = Some(self.inner.runtime.spawn(async move {
                tokio::time::sleep(interval).await;
                if let Some(inner) = weak.upgrade() {
                    let batch = inner.take(false);
                    inner.deliver(batch);
                }
            }));
            trace!("[{}] Flush scheduled", self.inner.name);
        }
    }

    /// Apply whatever is pending now; a no-op when nothing is pending
    pub fn flush(&self) {
        let batch = self.inner.take(true);
        self.inner.deliver(batch);
    }

    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Drop pending updates, abort the timer without flushing and close the
    /// throttler to further pushes
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock();
        state.closed = true;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        let dropped = state.pending.len();
        state.pending.clear();
        if dropped > 0 {
            debug!("[{}] Cancelled with {} pending updates", self.inner.name, dropped);
        }
    }
}

impl<K, V> Inner<K, V> {
    /// Swap the pending map for an empty one and disarm the timer
    fn take(&self, abort_timer: bool) -> HashMap<K, V> {
        let mut state = self.state.lock();
        if let Some(timer) = state.timer.take() {
            if abort_timer {
                timer.abort();
            }
        }
        mem::take(&mut state.pending)
    }

    fn deliver(&self, batch: HashMap<K, V>) {
        if batch.is_empty() {
            return;
        }
        trace!("[{}] Flushing {} updates", self.name, batch.len());
        (self.sink)(batch);
    }
}
