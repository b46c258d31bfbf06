//! Reconnect backoff policy

use std::time::Duration;

/// Exponential backoff with a cap and a maximum number of attempts.
///
/// `delay(attempt) = min(base * 2^attempt, cap)` where `attempt` counts the
/// failed connections since the last successful open, starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base: Duration,
    cap: Duration,
    max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), Duration::from_millis(30_000), 5)
    }
}

impl ReconnectPolicy {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before reconnect attempt number `attempt + 1`
    pub fn delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base.as_millis().min(u64::MAX as u128) as u64;
        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let delay = Duration::from_millis(base_ms.saturating_mul(factor));
        delay.min(self.cap)
    }

    /// Whether another automatic attempt is allowed after `attempts` failures
    pub fn allows(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}
