//! # Exponential Backoff
//!
//! Backoff applied by the error policy when a reconciliation pass returns
//! an error (status or finalizer write conflicts, detach failures).
//!
//! Sequence: 1s, 2s, 4s, 8s, ... capped at 5 minutes. The reconciler
//! keeps one per record and drops it after a successful pass.

use std::time::Duration;

/// Exponential backoff calculator
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Upper bound
    max: Duration,
    /// Value returned by the next call
    current: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(300))
    }
}

impl ExponentialBackoff {
    /// Create a backoff starting at `min` and doubling up to `max`
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { max, current: min }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        self.current = std::cmp::min(self.current.saturating_mul(2), self.max);
        result
    }
}
