//! # Backoff policy for requeued events.
//!
//! When the factory receives an event for a name it has no registration for,
//! it does not drop it: the event is sent back to the factory loop after a
//! delay computed by [`BackoffPolicy::next`].
//!
//! The delay for requeue attempt `n` is `first × factor^n`, clamped to `max`,
//! then jitter is applied. The base delay is derived purely from the attempt
//! number, so jitter never feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use topicvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(5),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(5));
//! assert_eq!(backoff.next(1), Duration::from_millis(10));
//! // 5ms × 2^10 = 5120ms → capped at max
//! assert_eq!(backoff.next(10), Duration::from_secs(1));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Requeue backoff policy.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first requeue.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`2.0` doubles every attempt).
    pub factor: f64,
    /// Jitter applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns a doubling policy:
    /// - `first = 5ms`;
    /// - `factor = 2.0`;
    /// - `max = 5s`;
    /// - no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(5),
            max: Duration::from_secs(5),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given requeue attempt (0-indexed).
    ///
    /// # Notes
    /// - Non-finite or negative intermediate values clamp to `max`.
    /// - If `first > max`, every attempt returns `max`.
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let unclamped = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !unclamped.is_finite() || unclamped < 0.0 || unclamped > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped)
        };
        self.jitter.apply(base)
    }
}
