//! # Factory: registry-owned topics and gates.
//!
//! [`Factory`] is a cheap, clonable handle to one registry loop. Every method
//! turns into a command on that loop's queue and waits for its reply, so a
//! returned topic is fully registered (initial subscribers included) before
//! the caller can publish to it.
//!
//! ## Example
//! ```rust
//! use tokio::sync::mpsc;
//! use topicvisor::{Event, Factory, SubscriberFn, SubscriberRef, Topic};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), topicvisor::Error> {
//!     let factory = Factory::new();
//!     let orders = factory.new_topic("orders", Vec::new()).await?;
//!     let fills = factory.new_topic("fills", Vec::new()).await?;
//!
//!     let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
//!     let sink: SubscriberRef = SubscriberFn::arc("sink", move |ev: Event| {
//!         let tx = tx.clone();
//!         async move { let _ = tx.send(ev); }
//!     });
//!     let both = factory.and_gate(&[orders.clone(), fills.clone()], vec![sink]).await?;
//!
//!     orders.publisher().publish("order-1")?;
//!     fills.publisher().publish("fill-1")?;
//!
//!     let joined = rx.recv().await.unwrap();
//!     assert_eq!(joined.as_joined().unwrap().len(), 2);
//!     assert!(both.name().ends_with("orders & fills"));
//!
//!     factory.close().await
//! }
//! ```

use std::collections::HashSet;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::config::Config;
use crate::core::gate::{GateCollector, GateMode};
use crate::core::handle::RegisteredTopic;
use crate::core::registry::{Command, GateSource, Kind, Registry};
use crate::error::Error;
use crate::subscribers::SubscriberRef;
use crate::topics::{Publisher, Topic, TopicRef, clamp_interval, ensure_usable};

/// Handle to a serialized topic registry.
///
/// Clones share the same registry. Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct Factory {
    tx: mpsc::UnboundedSender<Command>,
    registry: u64,
}

impl Factory {
    /// Starts a registry with [`Config::default`].
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Starts a registry with a custom configuration.
    pub fn with_config(cfg: Config) -> Self {
        let (tx, registry) = Registry::spawn(cfg);
        Self { tx, registry }
    }

    /// Registers a topic together with its initial subscribers.
    ///
    /// # Errors
    /// - [`Error::DuplicateTopic`] if `name` is taken in this factory.
    /// - [`Error::FactoryClosed`] after [`Factory::close`].
    pub async fn new_topic(
        &self,
        name: impl Into<String>,
        subscribers: Vec<SubscriberRef>,
    ) -> Result<TopicRef, Error> {
        self.register(name.into(), Kind::Topic, subscribers).await
    }

    /// Registers a receive-only topic that publishes a [`Tick`](crate::Tick)
    /// every `interval` (clamped to one millisecond at least and about 30
    /// years at most).
    ///
    /// Ticks that fire while the topic has no subscriber are discarded.
    pub async fn new_ticker_topic(
        &self,
        name: impl Into<String>,
        interval: Duration,
    ) -> Result<TopicRef, Error> {
        let kind = Kind::Ticker(clamp_interval(interval));
        self.register(name.into(), kind, Vec::new()).await
    }

    /// Joins `sources` into a topic that publishes once every source has
    /// published since the last flush.
    ///
    /// The payload is a [`Joined`](crate::Joined) map holding every event
    /// seen per source since the previous flush, in arrival order.
    ///
    /// Sources created by this factory are linked to the gate in the same
    /// registry step that registers it, and feed it in publish order. Other
    /// sources (standalone topics, topics of another factory) get a collector
    /// subscriber; their events reach the gate through a delivery task each,
    /// so two events of one such source can be recorded out of order on a
    /// multi-threaded runtime.
    ///
    /// # Errors
    /// - [`Error::MissingTopic`] for an empty list or a closed source.
    /// - [`Error::DuplicateTopic`] if two sources share a name.
    pub async fn and_gate(
        &self,
        sources: &[TopicRef],
        subscribers: Vec<SubscriberRef>,
    ) -> Result<TopicRef, Error> {
        self.gate(GateMode::And, sources, subscribers).await
    }

    /// Joins `sources` into a topic that publishes on every source event.
    ///
    /// Same payload shape and errors as [`Factory::and_gate`].
    pub async fn or_gate(
        &self,
        sources: &[TopicRef],
        subscribers: Vec<SubscriberRef>,
    ) -> Result<TopicRef, Error> {
        self.gate(GateMode::Or, sources, subscribers).await
    }

    /// Returns a publisher addressed by name.
    ///
    /// The name does not need to be registered yet: events for unknown names
    /// are requeued with backoff until the topic shows up or the requeue
    /// budget is spent. Fails with [`Error::FactoryClosed`] once the factory
    /// is closed.
    pub fn publisher_for(&self, name: impl Into<String>) -> Publisher {
        let name: Arc<str> = Arc::from(name.into());
        let target = Arc::clone(&name);
        let tx = self.tx.clone();
        Publisher::new(name, move |event| {
            tx.send(Command::Route {
                name: Arc::clone(&target),
                event,
                attempt: 0,
            })
            .map_err(|_| Error::FactoryClosed)
        })
    }

    /// Sorted names of the topics currently registered.
    pub async fn topics(&self) -> Result<Vec<String>, Error> {
        self.request(|reply| Command::List { reply }).await
    }

    /// Unregisters and closes every topic of this factory, then stops the loop.
    ///
    /// Topics closed individually beforehand are fine; closing twice is a no-op.
    pub async fn close(&self) -> Result<(), Error> {
        if self
            .request(|reply| Command::Shutdown { reply })
            .await
            .is_ok()
        {
            debug!("factory closed");
        }
        Ok(())
    }

    /// Returns `true` once the registry loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn register(
        &self,
        name: String,
        kind: Kind,
        subscribers: Vec<SubscriberRef>,
    ) -> Result<TopicRef, Error> {
        let name: Arc<str> = Arc::from(name);
        let registration = self
            .request(|reply| Command::Register {
                name,
                kind,
                subscribers,
                reply,
            })
            .await??;
        let topic: TopicRef = RegisteredTopic::new(registration, kind, self.tx.clone());
        Ok(topic)
    }

    async fn gate(
        &self,
        mode: GateMode,
        sources: &[TopicRef],
        subscribers: Vec<SubscriberRef>,
    ) -> Result<TopicRef, Error> {
        ensure_usable(sources, "gate")?;
        let names: Vec<Arc<str>> = sources.iter().map(|t| Arc::from(t.name())).collect();
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name) {
                return Err(Error::DuplicateTopic {
                    topic: name.to_string(),
                });
            }
        }

        let plan: Vec<GateSource> = sources
            .iter()
            .zip(&names)
            .map(|(topic, name)| GateSource {
                name: Arc::clone(name),
                slot: topic
                    .slot()
                    .filter(|addr| addr.registry == self.registry)
                    .map(|addr| addr.id),
            })
            .collect();
        let registration = self
            .request(|reply| Command::RegisterGate {
                mode,
                sources: plan.clone(),
                subscribers,
                reply,
            })
            .await??;
        let gate_closed = registration.closed.clone();
        let gate_name = Arc::clone(&registration.name);
        let gate: TopicRef = RegisteredTopic::new(registration, Kind::Gate, self.tx.clone());

        // Collectors left on earlier sources after a failure go quiet with the gate token.
        let mut accepted = Vec::new();
        for (source, entry) in sources.iter().zip(&plan).filter(|(_, e)| e.slot.is_none()) {
            let collector = GateCollector::arc(
                Arc::clone(&gate_name),
                Arc::clone(&entry.name),
                gate_closed.clone(),
                self.tx.downgrade(),
            );
            match source.subscribe(collector) {
                Ok(subscribed) => accepted.push(subscribed.into_future()),
                Err(e) => {
                    let _ = gate.close();
                    return Err(e);
                }
            }
        }
        if let Err(e) = try_join_all(accepted).await {
            let _ = gate.close();
            return Err(e);
        }

        debug!(
            gate = %gate_name,
            sources = names.len(),
            standalone = plan.iter().filter(|e| e.slot.is_none()).count(),
            "gate wired"
        );
        Ok(gate)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, Error> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .map_err(|_| Error::FactoryClosed)?;
        rx.await.map_err(|_| Error::FactoryClosed)
    }
}

impl Default for Factory {
    /// Same as [`Factory::new`]; must be called inside a tokio runtime.
    fn default() -> Self {
        Self::new()
    }
}
