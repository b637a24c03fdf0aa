//! Factory core: the serialized registry and everything it owns.
//!
//! The only public API from this module is [`Factory`], a handle that turns
//! calls into commands on the registry loop.
//!
//! Internal modules:
//! - [`registry`]: the single-writer loop owning topic slots and gate state;
//! - [`gate`]: AND/OR accumulators and the collectors feeding them;
//! - [`handle`]: topic handles addressing registry slots;
//! - [`factory`]: the public request/reply surface.

mod factory;
mod gate;
mod handle;
mod registry;

pub use factory::Factory;
