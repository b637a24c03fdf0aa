//! # Actor-backed topic.
//!
//! [`ActorTopic`] owns its subscriber list inside a dedicated task. Handles
//! (the topic itself and every [`Publisher`]) only push commands onto the
//! loop's queue, so the list has exactly one writer.
//!
//! ## Architecture
//! ```text
//! publish(v) ──► Command::Publish ──┐
//!                                   ├──► run() ──► fan_out ──► spawn per subscriber
//! subscribe(s) ► Command::Subscribe ┘      │
//!                                          └─► closed.cancelled() → exit
//! ```
//!
//! ## Rules
//! - Commands are handled one at a time in FIFO order.
//! - Nothing is delivered before the first subscriber arrives; events
//!   published earlier are held and flushed to it in order. At most
//!   1024 are kept; older ones are dropped with a warning.
//! - The loop never waits for a subscriber to finish.
//! - Commands still queued when the topic closes are dropped; their
//!   `Subscribed` signals resolve to `ClosedTopic`.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::DEFAULT_MAX_HELD;
use crate::error::Error;
use crate::events::Event;
use crate::subscribers::{SubscriberRef, fan_out};
use crate::topics::mailbox::{Command, Mailbox};
use crate::topics::{Publisher, Subscribed, Topic};

/// Standalone topic served by its own command loop.
///
/// Must be created inside a tokio runtime.
pub struct ActorTopic {
    mailbox: Mailbox<Command>,
}

impl ActorTopic {
    /// Spawns the command loop and returns the topic handle.
    pub fn spawn(name: impl Into<Arc<str>>) -> Arc<Self> {
        let name: Arc<str> = name.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();

        tokio::spawn(run(Arc::clone(&name), rx, closed.clone()));
        Arc::new(Self {
            mailbox: Mailbox::new(name, tx, closed),
        })
    }
}

impl Topic for ActorTopic {
    fn name(&self) -> &str {
        self.mailbox.name()
    }

    fn publisher(&self) -> Publisher {
        self.mailbox.publisher()
    }

    fn subscribe(&self, subscriber: SubscriberRef) -> Result<Subscribed, Error> {
        self.mailbox.subscribe(subscriber)
    }

    fn close(&self) -> Result<(), Error> {
        self.mailbox.close();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }
}

async fn run(name: Arc<str>, mut rx: mpsc::UnboundedReceiver<Command>, closed: CancellationToken) {
    let mut subscribers: Vec<SubscriberRef> = Vec::new();
    let mut held: VecDeque<Event> = VecDeque::new();
    debug!(topic = %name, "topic loop started");

    loop {
        tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            cmd = rx.recv() => match cmd {
                Some(Command::Subscribe { subscriber, done }) => {
                    debug!(topic = %name, subscriber = subscriber.name(), "subscriber added");
                    subscribers.push(subscriber);
                    let _ = done.send(());
                    while let Some(ev) = held.pop_front() {
                        fan_out(&name, &subscribers, &ev);
                    }
                }
                Some(Command::Publish(ev)) => {
                    if subscribers.is_empty() {
                        held.push_back(ev);
                        if held.len() > DEFAULT_MAX_HELD {
                            held.pop_front();
                            warn!(topic = %name, cap = DEFAULT_MAX_HELD, "held event dropped");
                        }
                    } else {
                        fan_out(&name, &subscribers, &ev);
                    }
                }
                None => break,
            }
        }
    }

    rx.close();
    debug!(topic = %name, undelivered = held.len(), "topic loop exited");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::subscribers::testing::channel;
    use crate::topics::TopicRef;

    const WAIT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn publish_before_first_subscriber_is_held() {
        let topic = ActorTopic::spawn("early");
        topic.publisher().publish("hello").unwrap();

        let (sub, mut rx) = channel("late");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());

        topic.subscribe(sub).unwrap().await.unwrap();
        let ev = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(ev.downcast_ref::<&str>(), Some(&"hello"));
    }

    #[tokio::test]
    async fn every_subscriber_gets_the_event() {
        let topic = ActorTopic::spawn("fan");
        let mut receivers = Vec::new();
        for name in ["a", "b", "c"] {
            let (sub, rx) = channel(name);
            topic.subscribe(sub).unwrap().await.unwrap();
            receivers.push(rx);
        }

        topic.publisher().publish(42_u32).unwrap();
        for rx in &mut receivers {
            let ev = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
            assert_eq!(ev.downcast_ref::<u32>(), Some(&42));
        }
    }

    #[tokio::test]
    async fn per_topic_order_is_kept_for_one_subscriber() {
        let topic = ActorTopic::spawn("fifo");
        let (sub, mut rx) = channel("one");
        topic.subscribe(sub).unwrap().await.unwrap();

        let publisher = topic.publisher();
        for i in 0..5_u32 {
            publisher.publish(i).unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        for i in 0..5_u32 {
            let ev = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
            assert_eq!(ev.downcast_ref::<u32>(), Some(&i));
        }
    }

    #[tokio::test]
    async fn closed_topic_rejects_publish_and_subscribe() {
        let topic: TopicRef = ActorTopic::spawn("done");
        let publisher = topic.publisher();
        topic.close().unwrap();
        topic.close().unwrap();

        assert!(topic.is_closed());
        assert_eq!(publisher.publish(1_u8), Err(Error::closed("done")));
        let (sub, _rx) = channel("late");
        assert_eq!(topic.subscribe(sub).unwrap_err(), Error::closed("done"));
    }

    #[tokio::test]
    async fn display_prints_the_name() {
        let topic: TopicRef = ActorTopic::spawn("orders");
        assert_eq!(topic.to_string(), "orders");
    }
}
