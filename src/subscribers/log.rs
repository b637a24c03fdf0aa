//! # LogWriter: event logger
//!
//! A minimal subscriber that records every event it receives through `tracing`.
//! Attach it to a topic while debugging wiring; install any `tracing`
//! subscriber to see the output.
//!
//! ## Example output
//! ```text
//! INFO topicvisor: event topic="orders" payload="alloc::string::String"
//! INFO topicvisor: tick topic="heartbeat" seq=3
//! INFO topicvisor: joined topic="orders & fills" sources=["fills", "orders"]
//! WARN topicvisor: timed out topic="orders" after_ms=50
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, Tick, TimedOut};
use crate::subscribers::Subscribe;

/// Event logging subscriber.
#[derive(Debug, Clone)]
pub struct LogWriter {
    topic: String,
}

impl LogWriter {
    /// Construct a [`LogWriter`] that tags records with `topic`.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let topic = self.topic.as_str();
        if let Some(tick) = e.downcast_ref::<Tick>() {
            info!(topic, seq = tick.seq, "tick");
        } else if let Some(t) = e.downcast_ref::<TimedOut>() {
            warn!(topic = %t.topic, after_ms = t.after.as_millis() as u64, "timed out");
        } else if let Some(joined) = e.as_joined() {
            let sources: Vec<&str> = joined.keys().map(String::as_str).collect();
            info!(topic, ?sources, "joined");
        } else {
            info!(topic, payload = e.type_name(), "event");
        }
    }

    fn name(&self) -> &str {
        "LogWriter"
    }
}
