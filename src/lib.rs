//! # topicvisor
//!
//! **Topicvisor** is an in-process publish/subscribe library built on actors.
//!
//! Named topics accept events and fan them out to subscribers. Derived topics
//! join several sources under AND/OR semantics, clocks drive ticker and
//! timeout topics, and call-scoped awaits wait for a set of topics with a
//! deadline. Nothing is guarded by a lock: every piece of mutable state is
//! owned by exactly one task and reached only through its command queue.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!      ┌────────────┐   ┌────────────┐   ┌────────────┐
//!      │ Publisher  │   │ Publisher  │   │ publisher_ │
//!      │ (topic t1) │   │ (topic t2) │   │ for("t3")  │
//!      └─────┬──────┘   └─────┬──────┘   └─────┬──────┘
//!            ▼                ▼                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Factory registry loop (single writer)                       │
//! │  - slots: name → subscribers + gate links + held events       │
//! │  - gates: name → AND/OR accumulator, fed in route order      │
//! │  - unknown name → requeue with backoff (Config::requeue)     │
//! └──────┬─────────────────────┬─────────────────────▲───────────┘
//!        ▼                     ▼                     │
//!     fan_out               fan_out          Command::Collect
//!   ┌────┼────┐           ┌────┼────┐                │
//!   ▼    ▼    ▼           ▼    ▼    ▼                │
//!  sub  sub  sub         sub  sub  sub     GateCollector on a
//! (own task each)                          standalone gate source
//! ```
//!
//! ### Standalone topics
//! ```text
//! ActorTopic   : command loop → holds events until the first subscriber → fan_out
//! TimerTopic   : clock loop   → Tick / TimedOut; publish = reset the clock
//! TemporaryTopic: wrapper     → close() after ttl
//! ```
//!
//! ## Features
//! | Area            | Description                                                  | Key types / functions                         |
//! |-----------------|--------------------------------------------------------------|-----------------------------------------------|
//! | **Topics**      | Publish, subscribe, close; payload-agnostic events.          | [`Topic`], [`Publisher`], [`Event`]           |
//! | **Factory**     | Serialized registry, tickers, AND/OR gates, requeue.         | [`Factory`], [`Joined`], [`Tick`]             |
//! | **Subscribers** | Callbacks run in their own task, panics isolated.            | [`Subscribe`], [`SubscriberFn`]               |
//! | **Joins**       | Bounded waits and publish deadlines.                         | [`await_all`], [`await_any`], [`Watchdog`]    |
//! | **Policies**    | Requeue backoff with jitter.                                 | [`BackoffPolicy`], [`JitterPolicy`]           |
//! | **Errors**      | One typed error enum with stable labels.                     | [`Error`]                                     |
//! | **Configuration** | Factory settings.                                          | [`Config`]                                    |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] subscriber _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use topicvisor::{Event, Factory, SubscriberFn, SubscriberRef, Topic, must_await_all};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), topicvisor::Error> {
//!     let factory = Factory::new();
//!
//!     let printer: SubscriberRef = SubscriberFn::arc("printer", |ev: Event| async move {
//!         if let Some(msg) = ev.downcast_ref::<&str>() {
//!             println!("got {msg}");
//!         }
//!     });
//!     let greetings = factory.new_topic("greetings", vec![printer]).await?;
//!     let replies = factory.new_topic("replies", Vec::new()).await?;
//!
//!     // Forwarders attach on the first poll, before either publish is queued.
//!     let topics = [greetings.clone(), replies.clone()];
//!     let (seen, published) = tokio::join!(
//!         must_await_all(&topics, Duration::from_secs(1)),
//!         async {
//!             greetings.publisher().publish("hello")?;
//!             replies.publisher().publish("hi")
//!         },
//!     );
//!     published?;
//!     assert_eq!(seen?.len(), 2);
//!
//!     factory.close().await
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod join;
mod policies;
mod subscribers;
mod topics;

// ---- Public re-exports ----

pub use config::Config;
pub use core::Factory;
pub use error::Error;
pub use events::{Event, Joined, Tick, TimedOut};
pub use join::{
    Awaited, Watchdog, await_all, await_any, must_await_all, must_await_any, must_publish_within,
    published_within, when_timeout,
};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use subscribers::{Subscribe, SubscriberFn, SubscriberRef};
pub use topics::{ActorTopic, Publisher, Subscribed, TemporaryTopic, TimerTopic, Topic, TopicRef};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
