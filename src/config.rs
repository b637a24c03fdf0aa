//! # Factory configuration.
//!
//! Provides [`Config`] centralized settings for a [`Factory`](crate::Factory).
//!
//! ## Sentinel values
//! - `max_requeues = 0` → undeliverable events are dropped on first miss.
//! - `max_held = 0` → events published before the first consumer are dropped.

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// How many events a topic keeps while it has no consumer.
pub(crate) const DEFAULT_MAX_HELD: usize = 1024;

/// Configuration for a factory registry.
///
/// ## Field semantics
/// - `requeue`: delay growth for events addressed to an unregistered name
/// - `max_requeues`: how many times such an event is retried before it is dropped
/// - `max_held`: how many events a consumer-less topic keeps for its first consumer
#[derive(Clone, Debug)]
pub struct Config {
    /// Backoff applied between requeue attempts.
    ///
    /// The default doubles the delay every attempt, starting from 5ms and
    /// capped at 5s.
    pub requeue: BackoffPolicy,

    /// Maximum number of requeue attempts per event.
    ///
    /// With the defaults an event keeps being retried for roughly 40s of
    /// cumulative delay before it is dropped with a warning.
    pub max_requeues: u32,

    /// Maximum number of events held by a topic that has no subscriber yet.
    ///
    /// Applies to factory topics and gate outputs. Once full, the oldest held
    /// event is dropped with a warning for every new one.
    pub max_held: usize,
}

impl Config {
    /// Returns the delay before requeue attempt `attempt`, or `None` once the
    /// attempt budget is spent.
    #[inline]
    pub fn requeue_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_requeues {
            None
        } else {
            Some(self.requeue.next(attempt))
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `requeue = BackoffPolicy::default()` (5ms doubling, capped at 5s)
    /// - `max_requeues = 16`
    /// - `max_held = 1024`
    fn default() -> Self {
        Self {
            requeue: BackoffPolicy::default(),
            max_requeues: 16,
            max_held: DEFAULT_MAX_HELD,
        }
    }
}
