//! # Self-closing topic wrapper.
//!
//! [`TemporaryTopic`] delegates to any topic and closes it once its time to
//! live elapses. Operations after expiry fail with
//! [`Error::ClosedTopic`](crate::Error::ClosedTopic) like on any closed topic.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tracing::debug;

use crate::error::Error;
use crate::subscribers::SubscriberRef;
use crate::topics::{Publisher, SlotAddr, Subscribed, Topic, TopicRef};

/// A topic that closes itself after a fixed time to live.
pub struct TemporaryTopic {
    inner: TopicRef,
    ttl: Duration,
}

impl TemporaryTopic {
    /// Wraps `topic` and schedules its close after `ttl`.
    ///
    /// The expiry task only holds a weak reference, so dropping every handle
    /// before the deadline does not keep the topic alive.
    pub fn wrap(topic: TopicRef, ttl: Duration) -> Arc<Self> {
        let weak = Arc::downgrade(&topic);
        tokio::spawn(async move {
            time::sleep(ttl).await;
            if let Some(topic) = weak.upgrade() {
                if !topic.is_closed() {
                    debug!(topic = topic.name(), ?ttl, "temporary topic expired");
                    let _ = topic.close();
                }
            }
        });
        Arc::new(Self { inner: topic, ttl })
    }

    /// The configured time to live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Topic for TemporaryTopic {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn publisher(&self) -> Publisher {
        self.inner.publisher()
    }

    fn subscribe(&self, subscriber: SubscriberRef) -> Result<Subscribed, Error> {
        self.inner.subscribe(subscriber)
    }

    fn close(&self) -> Result<(), Error> {
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn slot(&self) -> Option<SlotAddr> {
        self.inner.slot()
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::{sleep, timeout};

    use super::*;
    use crate::subscribers::testing::channel;
    use crate::topics::ActorTopic;

    #[tokio::test]
    async fn works_until_expiry_then_rejects() {
        let topic = TemporaryTopic::wrap(ActorTopic::spawn("short"), Duration::from_millis(40));
        let (sub, mut rx) = channel("watch");
        topic.subscribe(sub).unwrap().await.unwrap();

        let publisher = topic.publisher();
        publisher.publish("still open").unwrap();
        let ev = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(ev.downcast_ref::<&str>(), Some(&"still open"));

        sleep(Duration::from_millis(80)).await;
        assert!(topic.is_closed());
        assert_eq!(publisher.publish("too late"), Err(Error::closed("short")));
    }

    #[tokio::test]
    async fn early_close_is_fine() {
        let topic = TemporaryTopic::wrap(ActorTopic::spawn("early"), Duration::from_millis(20));
        topic.close().unwrap();
        sleep(Duration::from_millis(40)).await;
        assert!(topic.is_closed());
        assert_eq!(topic.ttl(), Duration::from_millis(20));
    }
}
