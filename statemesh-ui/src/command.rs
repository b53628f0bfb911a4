//! Commands: side effects as data.
//!
//! `update` never performs I/O. It returns commands, the runtime
//! executes them asynchronously, and each one feeds a message back into
//! the queue when it completes or times out. In-flight commands are
//! never cancelled mid-flight.
//!
//! Publish commands carry the version computed inside `update` but no
//! timestamp — the runtime stamps wall-clock time at the I/O boundary,
//! keeping `update` deterministic.

use statemesh_types::{EntityId, TypeTag};
use std::time::Duration;

use crate::message::Message;

/// A side effect to be executed by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Publish a component update on the entity's subject.
    PublishUpdate {
        entity_id: EntityId,
        type_tag: TypeTag,
        data: serde_json::Value,
        version: u64,
    },

    /// Publish a detach notice on the entity's subject.
    PublishDetach {
        entity_id: EntityId,
        type_tag: TypeTag,
    },

    /// Run an entity query; completion feeds
    /// [`Message::QueryResult`] back.
    Query { tags: Vec<TypeTag> },

    /// Feed `message` back after `delay`.
    Timer {
        delay: Duration,
        message: Box<Message>,
    },
}
