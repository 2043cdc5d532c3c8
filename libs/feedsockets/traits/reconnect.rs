use std::time::Duration;

/// Delay before the first reconnect attempt
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1_000);

/// Upper bound on any single reconnect delay
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Reconnect attempts allowed before the connection enters `Error`
pub const DEFAULT_MAX_ATTEMPTS: usize = 10;

/// Decides whether, and after how long, a dropped feed reconnects
///
/// `attempt` is the number of reconnects already made since the last
/// successful open (0-indexed). The client resets it to 0 on every
/// successful connection.
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before the next attempt, or `None` to stop reconnecting
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    /// Check if we should continue reconnecting
    fn should_reconnect(&self, attempt: usize) -> bool;
}

/// Exponential backoff reconnection strategy
///
/// Delays grow as `initial_delay * 2^attempt`, capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<usize>,
}

impl ExponentialBackoff {
    /// # Arguments
    /// * `initial_delay` - The delay before the first reconnect
    /// * `max_delay` - The cap applied to every delay
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts,
        }
    }
}

impl Default for ExponentialBackoff {
    /// 1s, 2s, 4s, ... capped at 30s, for at most 10 attempts
    fn default() -> Self {
        Self::new(
            DEFAULT_INITIAL_DELAY,
            DEFAULT_MAX_DELAY,
            Some(DEFAULT_MAX_ATTEMPTS),
        )
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }

        // 2^attempt saturates long before u64 overflows matter for the cap
        let factor = 1u64.checked_shl(attempt.min(63) as u32).unwrap_or(u64::MAX);
        let delay = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        Some(Duration::from_millis(
            delay.min(self.max_delay.as_millis() as u64),
        ))
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Fixed delay reconnection strategy
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<usize>,
}

impl FixedDelay {
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self { delay, max_attempts }
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }
        Some(self.delay)
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Reconnection disabled: the client stops after the first disconnect
#[derive(Debug, Clone)]
pub struct NeverReconnect;

impl ReconnectionStrategy for NeverReconnect {
    fn next_delay(&self, _attempt: usize) -> Option<Duration> {
        None
    }

    fn should_reconnect(&self, _attempt: usize) -> bool {
        false
    }
}
