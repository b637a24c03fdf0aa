//! # Topic contract.
//!
//! Every topic kind in the crate (standalone actor/timer topics, factory
//! registered topics, gate outputs) is driven through the same object-safe
//! [`Topic`] trait, so callers can mix them freely behind a [`TopicRef`].
//!
//! ## Architecture
//! ```text
//! caller ── topic.publisher() ──► Publisher ── publish(v) ──► owning loop queue
//! caller ── topic.subscribe(s) ─► Subscribed ◄── accepted ── owning loop
//! caller ── topic.close() ──────► closed flag set (loop exits, handles reject)
//! ```
//!
//! ## Rules
//! - `publish` and `subscribe` only enqueue; the owning loop does the work.
//! - After `close()` both fail with [`Error::ClosedTopic`].
//! - `close()` is idempotent.

use std::any::Any;
use std::fmt;
use std::future::IntoFuture;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::oneshot;

use crate::error::Error;
use crate::events::Event;
use crate::subscribers::SubscriberRef;

/// A named pub/sub channel.
pub trait Topic: Send + Sync + 'static {
    /// Topic name, used in logs and as the key of aggregated payloads.
    fn name(&self) -> &str;

    /// Returns a capability that enqueues events onto this topic.
    fn publisher(&self) -> Publisher;

    /// Enqueues a subscription.
    ///
    /// The returned [`Subscribed`] resolves once the topic accepted the
    /// subscriber. Fails immediately if the topic is closed.
    fn subscribe(&self, subscriber: SubscriberRef) -> Result<Subscribed, Error>;

    /// Permanently closes the topic. Closing twice is a no-op.
    fn close(&self) -> Result<(), Error>;

    /// Returns `true` once [`Topic::close`] was called (or the topic expired).
    fn is_closed(&self) -> bool;

    /// Registry slot behind this topic, for topics created by a
    /// [`Factory`](crate::Factory). Other kinds keep the default.
    #[doc(hidden)]
    fn slot(&self) -> Option<SlotAddr> {
        None
    }
}

/// Address of a factory registry slot: which registry, which registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotAddr {
    pub(crate) registry: u64,
    pub(crate) id: u64,
}

/// Shared handle to a topic (`Arc<dyn Topic>`).
pub type TopicRef = Arc<dyn Topic>;

impl fmt::Display for dyn Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for dyn Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.name())
            .field("closed", &self.is_closed())
            .finish()
    }
}

type Sink = dyn Fn(Event) -> Result<(), Error> + Send + Sync;

/// Capability bound to one topic; every call enqueues one event.
///
/// Clones share the same destination. A publisher carries no state besides
/// the route to its topic.
#[derive(Clone)]
pub struct Publisher {
    topic: Arc<str>,
    sink: Arc<Sink>,
}

impl Publisher {
    pub(crate) fn new<F>(topic: Arc<str>, sink: F) -> Self
    where
        F: Fn(Event) -> Result<(), Error> + Send + Sync + 'static,
    {
        Self {
            topic,
            sink: Arc::new(sink),
        }
    }

    /// Enqueues `value` as one event.
    ///
    /// Passing an [`Event`] forwards it as is.
    pub fn publish<T: Any + Send + Sync>(&self, value: T) -> Result<(), Error> {
        (self.sink)(Event::new(value))
    }

    /// Name of the destination topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("topic", &self.topic)
            .finish()
    }
}

/// Completion signal of a subscription request.
///
/// `.await` yields `Ok(())` once the owning loop added the subscriber, or
/// [`Error::ClosedTopic`] if the loop terminated before getting to it.
/// Dropping it does not cancel the subscription.
#[must_use = "await it to know the subscription was accepted"]
#[derive(Debug)]
pub struct Subscribed {
    topic: Arc<str>,
    accepted: oneshot::Receiver<()>,
}

impl Subscribed {
    pub(crate) fn new(topic: Arc<str>, accepted: oneshot::Receiver<()>) -> Self {
        Self { topic, accepted }
    }

    /// Name of the topic the subscription targets.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl IntoFuture for Subscribed {
    type Output = Result<(), Error>;
    type IntoFuture = BoxFuture<'static, Result<(), Error>>;

    fn into_future(self) -> Self::IntoFuture {
        let Subscribed { topic, accepted } = self;
        async move { accepted.await.map_err(|_| Error::closed(&*topic)) }.boxed()
    }
}

/// Rejects an empty list or a closed member before anything subscribes.
pub(crate) fn ensure_usable(topics: &[TopicRef], what: &str) -> Result<(), Error> {
    if topics.is_empty() {
        return Err(Error::missing(format!("{what} needs at least one topic")));
    }
    if let Some(dead) = topics.iter().find(|t| t.is_closed()) {
        return Err(Error::missing(format!(
            "{what} was given closed topic {:?}",
            dead.name()
        )));
    }
    Ok(())
}
