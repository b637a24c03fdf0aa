//! # Topics.
//!
//! The [`Topic`] contract plus the standalone topic kinds that live outside a
//! [`Factory`](crate::Factory):
//!
//! - [`ActorTopic`] plain pub/sub topic served by its own command loop;
//! - [`TimerTopic`] clock-driven topic (ticker or source deadline);
//! - [`TemporaryTopic`] wrapper that closes another topic after a TTL.
//!
//! ```text
//!   Publisher ──► [ command queue ] ──► topic loop ──► fan_out ──► subscribers
//!   Subscribe ──►        ▲
//!                        └── single consumer: the loop is the only writer
//! ```

mod actor;
pub(crate) mod mailbox;
mod temporary;
mod timer;
mod topic;

pub use actor::ActorTopic;
pub use temporary::TemporaryTopic;
pub use timer::TimerTopic;
pub(crate) use timer::{clamp_interval, instant_after};
pub(crate) use topic::{SlotAddr, ensure_usable};
pub use topic::{Publisher, Subscribed, Topic, TopicRef};
