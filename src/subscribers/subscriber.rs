//! # Event subscriber trait.
//!
//! Provides [`Subscribe`] the extension point that receives events delivered by a topic.
//!
//! Each delivery gets:
//! - **Its own spawned task** (the topic loop never waits for it)
//! - **Panic isolation** (a panic is caught and logged, other deliveries are unaffected)
//!
//! ## Architecture
//! ```text
//! topic loop ──► fan_out(event) ──► tokio::spawn ──► subscriber.on_event()
//!                                │                 └─► panic caught → warn!
//!                                └► tokio::spawn ──► other_subscriber.on_event()
//! ```
//!
//! ## Rules
//! - No ordering between different subscribers of the same event.
//! - No ordering guarantee between two events for the same subscriber either:
//!   each delivery is an independent task.
//! - A slow subscriber never stalls the topic or other subscribers.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use topicvisor::{Event, Subscribe};
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Subscribe for Audit {
//!     async fn on_event(&self, ev: &Event) {
//!         if let Some(msg) = ev.downcast_ref::<String>() {
//!             // persist `msg`, export a metric, etc.
//!             let _ = msg;
//!         }
//!     }
//!
//!     fn name(&self) -> &str { "audit" }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::events::Event;

/// Receives events delivered by a topic.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; panics are caught but only logged.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from a dedicated task, never from the topic loop itself.
    async fn on_event(&self, event: &Event);

    /// Returns the subscriber name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Shared handle to a subscriber (`Arc<dyn Subscribe>`).
pub type SubscriberRef = Arc<dyn Subscribe>;
