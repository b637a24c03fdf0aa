//! Call-scoped joins over existing topics.
//!
//! - [`await_all`] / [`await_any`] (and their `must_*` variants): bounded waits
//!   for events across a set of topics;
//! - [`when_timeout`], [`must_publish_within`], [`published_within`]:
//!   deadlines on a single topic.

mod awaiting;
mod timeout;

pub use awaiting::{Awaited, await_all, await_any, must_await_all, must_await_any};
pub use timeout::{Watchdog, must_publish_within, published_within, when_timeout};
