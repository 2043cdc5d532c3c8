//! Rate limit for explicit stream reconnect requests
//!
//! A stream that ran out of retries parks until asked to reconnect. Each
//! request grants it a fresh retry budget, so requests are spaced at least
//! one cooldown apart per stream.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct ReconnectGate<K> {
    cooldown: Duration,
    last_request: HashMap<K, Instant>,
}

impl<K: Eq + Hash> ReconnectGate<K> {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_request: HashMap::new(),
        }
    }

    /// Whether a reconnect for `key` may be requested at `now`; records the
    /// request when it may
    pub fn allow(&mut self, key: K, now: Instant) -> bool {
        match self.last_request.get(&key) {
            Some(last) if now.saturating_duration_since(*last) < self.cooldown => false,
            _ => {
                self.last_request.insert(key, now);
                true
            }
        }
    }
}
