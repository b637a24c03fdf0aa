//! # Function-backed subscriber (`SubscriberFn`)
//!
//! [`SubscriberFn`] wraps a closure `F: Fn(Event) -> Fut`, producing a fresh
//! future per delivery. If state has to be shared across deliveries, capture an
//! `Arc<...>` (or a channel sender) in the closure explicitly.
//!
//! ## Example
//! ```rust
//! use tokio::sync::mpsc;
//! use topicvisor::{Event, Subscribe, SubscriberFn, SubscriberRef};
//!
//! let (tx, _rx) = mpsc::unbounded_channel::<Event>();
//! let sub: SubscriberRef = SubscriberFn::arc("forward", move |ev: Event| {
//!     let tx = tx.clone();
//!     async move {
//!         let _ = tx.send(ev);
//!     }
//! });
//!
//! assert_eq!(sub.name(), "forward");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::events::Event;
use crate::subscribers::Subscribe;

/// Function-backed subscriber implementation.
#[derive(Debug)]
pub struct SubscriberFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> SubscriberFn<F> {
    /// Creates a new function-backed subscriber.
    ///
    /// Prefer [`SubscriberFn::arc`] when you immediately need a [`SubscriberRef`](crate::SubscriberRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the subscriber and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Subscribe for SubscriberFn<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn on_event(&self, event: &Event) {
        (self.f)(event.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
