//! The message vocabulary.
//!
//! One closed enum covers everything the loop can observe: bridged
//! broker traffic, command results, transport health, and user input.
//! Decode failures get their own variant so the loop can render a
//! diagnostic instead of losing the event invisibly.

use statemesh_channel::Subject;
use statemesh_sync::QueryError;
use statemesh_types::{ComponentRecord, EntityId, TypeTag};

/// An inbound occurrence for the update loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A component update arrived on a subscription.
    Component(ComponentRecord),

    /// A detach notice arrived on a subscription.
    Detached {
        entity_id: EntityId,
        type_tag: TypeTag,
    },

    /// A query command finished.
    QueryResult {
        tags: Vec<TypeTag>,
        outcome: Result<Vec<EntityId>, QueryError>,
    },

    /// A delivery could not be decoded. Fed into the same queue as the
    /// traffic it came from, never dropped silently.
    DecodeFailed { subject: Subject, detail: String },

    /// A publish command failed. Surfaced, not retried here.
    PublishFailed { subject: Subject, detail: String },

    /// The transport stream broke; the bridge is retrying.
    TransportLost { detail: String },

    /// The bridge re-established its subscription.
    Reconnected,

    /// Retry budget exhausted. Terminal: the loop renders a
    /// disconnected state and stops issuing commands.
    Disconnected,

    /// User edited a component. The loop computes the successor
    /// version and issues a publish command; the change lands locally
    /// when the published record comes back through the subscription.
    EditComponent {
        entity_id: EntityId,
        type_tag: TypeTag,
        data: serde_json::Value,
    },

    /// User removed a component from an entity.
    RemoveComponent {
        entity_id: EntityId,
        type_tag: TypeTag,
    },

    /// User selected an entity.
    Select(EntityId),

    /// User toggled an entity's expansion.
    ToggleExpand(EntityId),

    /// User asked for the standing query to be re-issued.
    Refresh,
}
