//! # Subscribers and event delivery.
//!
//! This module provides the [`Subscribe`] trait, a closure-backed implementation
//! ([`SubscriberFn`]) and the fan-out used by every topic loop.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Publisher ── publish(value) ──► topic loop ──► fan_out(event)
//!                                                     │
//!                                        ┌────────────┼────────────┐
//!                                        ▼            ▼            ▼
//!                                   on_event()   on_event()   on_event()
//!                                  (own task)    (own task)   (own task)
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use topicvisor::{Subscribe, Event};
//! use async_trait::async_trait;
//!
//! struct Counter;
//!
//! #[async_trait]
//! impl Subscribe for Counter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.is::<u64>() {
//!             // increment a counter
//!         }
//!     }
//! }
//! ```

mod fanout;
#[cfg(feature = "logging")]
mod log;
mod subscriber;
mod subscriber_fn;

pub(crate) use fanout::fan_out;
#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscriber::{Subscribe, SubscriberRef};
pub use subscriber_fn::SubscriberFn;
