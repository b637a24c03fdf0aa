//! Requeue policies.
//!
//! Events addressed to a name the factory has not registered (yet) are sent
//! back to the factory loop after a growing delay.
//!
//! ## Contents
//! - [`BackoffPolicy`] how requeue delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization to spread requeues out
//!
//! ## Quick wiring
//! ```text
//! Config { requeue: BackoffPolicy, max_requeues: u32, max_held: usize }
//!      └─► core::registry uses:
//!           - requeue.next(attempt) to schedule the next delivery attempt
//!           - max_requeues to give up and drop the event
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → first=5ms, factor=2.0 (doubling), max=5s, jitter=None.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
