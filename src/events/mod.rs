//! Event payloads carried by topics.
//!
//! ## Contents
//! - [`Event`] opaque payload wrapper (`Arc<dyn Any + Send + Sync>`)
//! - [`Joined`] gate output shape (`source name → ordered events`)
//! - [`Tick`], [`TimedOut`] clock payloads
//!
//! ## Quick reference
//! - **Producers**: `Publisher::publish`, gates (`Joined`), ticker topics (`Tick`),
//!   timeout topics (`TimedOut`).
//! - **Consumers**: any [`Subscribe`](crate::Subscribe) implementation, await joins.

mod event;

pub use event::{Event, Joined, Tick, TimedOut};
