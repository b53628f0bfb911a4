//! Synchronization layer for statemesh.
//!
//! Sits between the transport ([`statemesh_channel`]) and the UI loop:
//!
//! - **ComponentStore**: applied component state with the version-based
//!   last-writer-wins rule and entity aggregate lifecycle
//! - **SubscriptionManager**: deduplicated, reference-counted pattern
//!   subscriptions with rate-based pruning
//! - **QueryEngine**: canonical request/reply queries over required
//!   component types
//! - **EntityRegistry**: the single-owner registry task answering query
//!   and membership requests over the channel
//! - **ComponentCache**: bounded, update-frequency-scored cache in front
//!   of the channel
//!
//! Conflict resolution is always by component version, never by
//! timestamp: applying a stale update is a defined no-op
//! ([`ApplyOutcome::Stale`]), not an error.

mod cache;
mod error;
mod protocol;
mod query;
mod registry;
mod store;
mod subscriptions;

pub use cache::{CacheStats, ComponentCache};
pub use error::{QueryError, SyncError, SyncResult};
pub use protocol::{EntityEvent, ErrorReply, QueryReply, RegistryRequest, RegistryReply};
pub use query::{QueryConfig, QueryEngine};
pub use registry::{EntityRegistry, RegistryHandle};
pub use store::{ApplyOutcome, ComponentStore};
pub use subscriptions::{
    SubscriptionConfig, SubscriptionHandle, SubscriptionManager, SubscriptionState,
};
