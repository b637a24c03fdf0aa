//! # Opaque event payloads.
//!
//! Topics are payload-agnostic: an [`Event`] wraps any `Send + Sync + 'static`
//! value behind an `Arc`, so fanning one event out to many subscribers only
//! clones a pointer. Subscribers narrow the payload back with
//! [`Event::downcast_ref`].
//!
//! A few payload shapes are produced by the crate itself:
//! - [`Joined`] - output of AND/OR gates (`source name → events since last flush`);
//! - [`Tick`] - emitted by ticker topics on every interval;
//! - [`TimedOut`] - emitted by timeout topics when a deadline elapses without a reset.
//!
//! ## Example
//! ```rust
//! use topicvisor::Event;
//!
//! let ev = Event::new("hello");
//! assert_eq!(ev.downcast_ref::<&str>(), Some(&"hello"));
//!
//! // Wrapping an event again does not nest it.
//! let again = Event::new(ev.clone());
//! assert!(again.ptr_eq(&ev));
//! ```

use std::any::{Any, type_name};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Aggregated gate payload: source topic name → ordered events since the last flush.
pub type Joined = BTreeMap<String, Vec<Event>>;

/// Opaque, cheaply clonable event payload.
#[derive(Clone)]
pub struct Event {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Event {
    /// Wraps a value into an event.
    ///
    /// Passing an `Event` returns it unchanged instead of nesting it.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        let boxed: Box<dyn Any + Send + Sync> = Box::new(value);
        match boxed.downcast::<Event>() {
            Ok(event) => *event,
            Err(boxed) => Self {
                value: Arc::from(boxed),
                type_name: type_name::<T>(),
            },
        }
    }

    /// Returns a reference to the payload if it is of type `T`.
    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.value).downcast_ref::<T>()
    }

    /// Returns `true` if the payload is of type `T`.
    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        (*self.value).is::<T>()
    }

    /// Type name of the wrapped payload (for logs).
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Shorthand for `downcast_ref::<Joined>()`.
    #[inline]
    pub fn as_joined(&self) -> Option<&Joined> {
        self.downcast_ref::<Joined>()
    }

    /// Returns `true` if both events share the same payload allocation.
    #[inline]
    pub fn ptr_eq(&self, other: &Event) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Event").field(&self.type_name).finish()
    }
}

/// Clock event published by ticker topics.
#[derive(Debug, Clone)]
pub struct Tick {
    /// Name of the ticker topic.
    pub topic: Arc<str>,
    /// Wall-clock time of the tick.
    pub at: SystemTime,
    /// Tick number, starting from 1.
    pub seq: u64,
}

/// Published by a timeout topic when its source stayed silent for `after`.
#[derive(Debug, Clone)]
pub struct TimedOut {
    /// Name of the watched source topic.
    pub topic: Arc<str>,
    /// The configured silence window.
    pub after: Duration,
    /// Wall-clock time the deadline elapsed.
    pub at: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_matches_payload_type() {
        let ev = Event::new(42_u32);
        assert!(ev.is::<u32>());
        assert_eq!(ev.downcast_ref::<u32>(), Some(&42));
        assert!(ev.downcast_ref::<i64>().is_none());
        assert_eq!(ev.type_name(), "u32");
    }

    #[test]
    fn wrapping_an_event_does_not_nest() {
        let ev = Event::new(String::from("hello"));
        let wrapped = Event::new(ev.clone());
        assert!(wrapped.ptr_eq(&ev));
        assert_eq!(wrapped.downcast_ref::<String>().map(String::as_str), Some("hello"));
    }

    #[test]
    fn joined_payload_is_reachable() {
        let mut joined = Joined::new();
        joined
            .entry("t1".to_string())
            .or_default()
            .push(Event::new("hello"));
        let ev = Event::new(joined);

        let back = ev.as_joined().expect("joined payload");
        assert_eq!(back["t1"].len(), 1);
        assert_eq!(back["t1"][0].downcast_ref::<&str>(), Some(&"hello"));
    }
}
