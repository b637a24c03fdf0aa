//! # Jitter policy for requeue delays.
//!
//! [`JitterPolicy`] randomizes requeue delays so that a burst of misrouted
//! events does not come back to the factory loop in lock-step.
//!
//! - [`JitterPolicy::None`] - exact delays
//! - [`JitterPolicy::Full`] - random delay in `[0, delay]`
//! - [`JitterPolicy::Equal`] - `delay/2 + random[0, delay/2]`

use rand::Rng;
use std::time::Duration;

/// Policy controlling randomization of requeue delays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum JitterPolicy {
    /// Use the computed delay as is.
    #[default]
    None,
    /// Random delay in `[0, delay]`.
    Full,
    /// `delay/2 + random[0, delay/2]`; keeps ~75% of the delay on average.
    Equal,
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        if ms == 0 {
            return delay;
        }
        let mut rng = rand::rng();
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Duration::from_millis(rng.random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                let extra = if half == 0 {
                    0
                } else {
                    rng.random_range(0..=half)
                };
                Duration::from_millis(half + extra)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let d = Duration::from_millis(123);
        assert_eq!(JitterPolicy::None.apply(d), d);
    }

    #[test]
    fn full_stays_within_delay() {
        let d = Duration::from_millis(40);
        for _ in 0..100 {
            assert!(JitterPolicy::Full.apply(d) <= d);
        }
    }

    #[test]
    fn equal_keeps_at_least_half() {
        let d = Duration::from_millis(40);
        for _ in 0..100 {
            let j = JitterPolicy::Equal.apply(d);
            assert!(j >= Duration::from_millis(20) && j <= d);
        }
    }

    #[test]
    fn zero_delay_is_untouched() {
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
    }
}
