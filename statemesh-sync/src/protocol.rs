//! Wire records exchanged over the channel.
//!
//! Component updates travel as bare [`ComponentRecord`] objects on
//! `entity.<uuid>` subjects — the field set is the wire contract.
//! [`EntityEvent`] is an untagged superset so detach notices can share
//! the subject without disturbing that contract: a component record and
//! a detach notice have disjoint field sets, so a self-describing
//! payload decodes unambiguously.

use serde::{Deserialize, Serialize};
use statemesh_types::{ComponentRecord, EntityId, Timestamp, TypeTag};

/// Anything published on an entity's subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityEvent {
    /// A component update (the bare wire record).
    Component(ComponentRecord),

    /// A component detached from an entity.
    Detached {
        entity_id: EntityId,
        type_tag: TypeTag,
        timestamp: Timestamp,
    },
}

impl EntityEvent {
    /// The entity this event concerns.
    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        match self {
            Self::Component(record) => record.entity_id,
            Self::Detached { entity_id, .. } => *entity_id,
        }
    }
}

/// Reply to a `query.<tags…>` or `registry.<tag>` list request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryReply {
    /// Matching live entities, ordered by id.
    pub entity_ids: Vec<EntityId>,
}

/// Request body for `registry.<tag>` subjects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RegistryRequest {
    /// List the live entities carrying this component type.
    List,

    /// Detach this component type from an entity.
    Detach { entity_id: EntityId },
}

/// Reply body for `registry.<tag>` requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RegistryReply {
    /// Membership listing.
    Listed { entity_ids: Vec<EntityId> },

    /// Detach acknowledgment; false when the tag was not attached.
    Detached { removed: bool },
}

/// Error reply sent when a request cannot be served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub code: u32,
    pub message: String,
}

impl ErrorReply {
    /// Creates an error reply.
    #[must_use]
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
