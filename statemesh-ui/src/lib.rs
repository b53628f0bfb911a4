//! Reactive state loop for statemesh.
//!
//! A Model–Update–View cycle over the synchronization layer:
//!
//! - **[`Message`]**: everything that can happen, bridged broker
//!   traffic and local user input alike, consumed from one inbound
//!   queue
//! - **[`update`]**: pure, synchronous, deterministic: same ordered
//!   messages from the same model always produce the same model
//! - **[`Command`]**: descriptions of side effects (publish, query,
//!   timer) the [`Runtime`] executes asynchronously; results re-enter
//!   the queue as messages
//! - **[`view`]**: pure projection of the model into a [`ViewModel`]
//! - **[`MessageBridge`]**: per-subscription forwarding tasks that
//!   decode deliveries and enqueue them in order
//!
//! The update loop is strictly single-threaded: no two `update` calls
//! ever run concurrently, and the loop never suspends mid-update. That
//! is what keeps the version-conflict rule and model mutation simple,
//! and what makes message logs replayable without a live broker.

mod bridge;
mod command;
mod message;
mod model;
mod runtime;
mod update;
mod view;

pub use bridge::{MessageBridge, RetryPolicy};
pub use command::Command;
pub use message::Message;
pub use model::{ConnectionStatus, Model};
pub use runtime::{Runtime, RuntimeConfig};
pub use update::{update, QUERY_RETRY_DELAY};
pub use view::{view, ComponentLine, EntityRow, ViewModel};
