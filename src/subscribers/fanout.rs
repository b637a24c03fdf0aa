//! # Non-blocking event fan-out.
//!
//! [`fan_out`] hands one event to every subscriber of a topic without the
//! calling loop waiting on any of them.
//!
//! ## Architecture
//! ```text
//! fan_out(topic, subscribers, event)
//!     │
//!     ├──► tokio::spawn ──► subscriber1.on_event()
//!     │                       └──► panic → warn!(topic, subscriber, info)
//!     ├──► tokio::spawn ──► subscriber2.on_event()
//!     └──► tokio::spawn ──► subscriberN.on_event()
//! ```
//!
//! ## Rules
//! - **Non-blocking**: `fan_out()` returns as soon as the tasks are spawned.
//! - **No cross-subscriber ordering**: deliveries may interleave or run in parallel.
//! - **Isolation**: a slow or panicking subscriber does not affect the others.
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a subscriber panics while holding a lock.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::warn;

use crate::events::Event;
use crate::subscribers::SubscriberRef;

/// Spawns one independent delivery task per subscriber.
///
/// Must be called from within a tokio runtime.
pub(crate) fn fan_out(topic: &Arc<str>, subscribers: &[SubscriberRef], event: &Event) {
    for sub in subscribers {
        let sub = Arc::clone(sub);
        let topic = Arc::clone(topic);
        let event = event.clone();
        tokio::spawn(async move { deliver(&topic, &sub, &event).await });
    }
}

/// Runs one delivery, converting a panic into a log record.
async fn deliver(topic: &str, sub: &SubscriberRef, event: &Event) {
    let fut = sub.on_event(event);
    if let Err(panic_err) = AssertUnwindSafe(fut).catch_unwind().await {
        let info = panic_message(&*panic_err);
        warn!(
            topic,
            subscriber = sub.name(),
            payload = event.type_name(),
            %info,
            "subscriber panicked"
        );
    }
}

fn panic_message(any: &(dyn Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use super::*;
    use crate::subscribers::SubscriberFn;

    #[tokio::test]
    async fn panicking_subscriber_does_not_block_others() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let boom: SubscriberRef = SubscriberFn::arc("boom", |_ev: Event| async move {
            panic!("boom");
        });
        let ok: SubscriberRef = SubscriberFn::arc("ok", move |ev: Event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(ev);
            }
        });

        let topic: Arc<str> = Arc::from("t");
        fan_out(&topic, &[boom, ok], &Event::new("hello"));

        let got = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("delivery in time")
            .expect("event");
        assert_eq!(got.downcast_ref::<&str>(), Some(&"hello"));
    }

    #[tokio::test]
    async fn slow_subscriber_does_not_delay_fan_out() {
        let (tx, mut rx) = mpsc::unbounded_channel::<&'static str>();
        let slow_tx = tx.clone();
        let slow: SubscriberRef = SubscriberFn::arc("slow", move |_ev: Event| {
            let tx = slow_tx.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                let _ = tx.send("slow");
            }
        });
        let fast: SubscriberRef = SubscriberFn::arc("fast", move |_ev: Event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send("fast");
            }
        });

        let topic: Arc<str> = Arc::from("t");
        fan_out(&topic, &[slow, fast], &Event::new(1_u8));

        let first = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(first, Some("fast"));
    }

    #[test]
    fn panic_message_extracts_strings() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*s), "static");
        let s: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*s), "owned");
        let s: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*s), "unknown panic");
    }
}
