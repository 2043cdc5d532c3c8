//! Transient highlight tracker
//!
//! Marks freshly opened rows for a fixed window so a consumer can animate
//! them. Every registration schedules its own removal timer; there is no
//! periodic sweep. Re-registering a key schedules another timer alongside
//! the first, and whichever fires first removes the key. Removal is
//! idempotent, so the later timer is a no-op.

use crate::domain::OrderType;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long a highlight stays active after registration
pub const HIGHLIGHT_TTL: Duration = Duration::from_millis(3500);

/// Called with the key after a timer actually removed an entry
pub type ExpiryNotifier = Arc<dyn Fn(&str) + Send + Sync>;

struct Inner {
    ttl: Duration,
    active: Mutex<HashMap<String, OrderType>>,
    timers: Mutex<Vec<JoinHandle<()>>>,
    on_expire: Option<ExpiryNotifier>,
}

/// Cheap to clone; clones share the same set and timers
#[derive(Clone)]
pub struct HighlightTracker {
    inner: Arc<Inner>,
}

impl HighlightTracker {
    pub fn new() -> Self {
        Self::build(HIGHLIGHT_TTL, None)
    }

    /// Tracker that reports each expiry, e.g. to trigger a view refresh
    pub fn with_notifier(on_expire: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self::build(HIGHLIGHT_TTL, Some(Arc::new(on_expire)))
    }

    fn build(ttl: Duration, on_expire: Option<ExpiryNotifier>) -> Self {
        Self {
            inner: Arc::new(Inner {
                ttl,
                active: Mutex::new(HashMap::new()),
                timers: Mutex::new(Vec::new()),
                on_expire,
            }),
        }
    }

    /// Mark `key` active and schedule its removal after the TTL
    ///
    /// Outside a tokio runtime the entry is still recorded but never
    /// expires on its own.
    pub fn register(&self, key: impl Into<String>, value: OrderType) {
        let key = key.into();
        self.inner.active.lock().insert(key.clone(), value);

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("[Highlight] No runtime, '{}' will not expire", key);
                return;
            }
        };

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let ttl = self.inner.ttl;
        let timer = runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = weak.upgrade() {
                expire(&inner, &key);
            }
        });

        let mut timers = self.inner.timers.lock();
        timers.retain(|t| !t.is_finished());
        timers.push(timer);
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.inner.active.lock().contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<OrderType> {
        self.inner.active.lock().get(key).copied()
    }

    /// Remove `key` now; returns whether it was active
    pub fn remove(&self, key: &str) -> bool {
        self.inner.active.lock().remove(key).is_some()
    }

    pub fn snapshot(&self) -> HashMap<String, OrderType> {
        self.inner.active.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.active.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Abort every pending timer and clear the set
    pub fn cancel_all(&self) {
        let timers: Vec<_> = self.inner.timers.lock().drain(..).collect();
        let pending = timers.iter().filter(|t| !t.is_finished()).count();
        for timer in timers {
            timer.abort();
        }
        self.inner.active.lock().clear();
        debug!("[Highlight] Cancelled {} pending timers", pending);
    }
}

impl Default for HighlightTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn expire(inner: &Inner, key: &str) {
    let removed = inner.active.lock().remove(key).is_some();
    if !removed {
        return;
    }
    debug!("[Highlight] Expired {}", key);
    if let Some(notify) = &inner.on_expire {
        notify(key);
    }
}
