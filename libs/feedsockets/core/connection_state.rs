//! Lock-free connection state and counters shared between the client task
//! and its observers.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Observable state of one feed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// Opening a transport (first open or a reconnect attempt)
    Connecting = 0,
    /// Transport is open and frames are flowing
    Connected = 1,
    /// Transport dropped or closed; a reconnect may be pending
    Disconnected = 2,
    /// Reconnect budget exhausted; waits for an explicit reconnect request
    Error = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Connected,
            3 => ConnectionState::Error,
            _ => ConnectionState::Disconnected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic holder for a [`ConnectionState`]
#[derive(Debug)]
pub struct AtomicConnectionState {
    inner: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: ConnectionState) {
        self.inner.store(state as u8, Ordering::Release);
    }

    /// Transition only if the current state equals `current`
    pub fn compare_exchange(
        &self,
        current: ConnectionState,
        new: ConnectionState,
    ) -> Result<ConnectionState, ConnectionState> {
        self.inner
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(ConnectionState::from_u8)
            .map_err(ConnectionState::from_u8)
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    #[inline]
    pub fn is_connecting(&self) -> bool {
        self.get() == ConnectionState::Connecting
    }

    #[inline]
    pub fn is_disconnected(&self) -> bool {
        self.get() == ConnectionState::Disconnected
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.get() == ConnectionState::Error
    }
}

impl Default for AtomicConnectionState {
    fn default() -> Self {
        Self::new(ConnectionState::Disconnected)
    }
}

/// Per-connection counters
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    messages_received: AtomicU64,
    handshakes_discarded: AtomicU64,
    parse_failures: AtomicU64,
    reconnect_count: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_handshakes(&self) {
        self.handshakes_discarded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_parse_failures(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_reconnects(&self) {
        self.reconnect_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn handshakes_discarded(&self) -> u64 {
        self.handshakes_discarded.load(Ordering::Relaxed)
    }

    pub fn parse_failures(&self) -> u64 {
        self.parse_failures.load(Ordering::Relaxed)
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count.load(Ordering::Relaxed)
    }
}
