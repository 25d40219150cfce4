//! Object store contract consumed by `iodev-core`.
//!
//! The ioBroker object database is an external collaborator: this crate
//! describes the wire shape of its records ([`RawObject`]), the async
//! operations the core needs ([`ObjectStore`]), and the change-notification
//! stream ([`ObjectSubscription`]). [`MemoryStore`] is an in-process backend
//! used by tests and embedders that keep the namespace in memory.

pub mod error;
pub mod memory;
pub mod object;
pub mod store;

pub use error::Error;
pub use memory::MemoryStore;
pub use object::{ObjectEvent, RawObject};
pub use store::{ObjectStore, ObjectSubscription, SubscriptionItem, pattern_matches};
