//! The versioned component envelope.
//!
//! A component is one typed attribute set attached to one entity. The
//! envelope is the unit of replication: the process that mutates an
//! entity constructs a record, publishes it, and every downstream copy is
//! an independent snapshot.
//!
//! For a given (entity, tag) pair the version is strictly increasing with
//! each published update. Receivers discard any inbound record whose
//! version is not greater than the last one they applied for that pair —
//! last-writer-wins by version, not by timestamp.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{EntityId, Timestamp, TypeTag};

/// Wire envelope for one component update.
///
/// The payload is self-describing JSON; the contract is the field set,
/// not the byte format. The tag travels in the envelope because the
/// `entity.<uuid>` routing key cannot carry it, and receivers need the
/// (entity, tag) pair to enforce the version rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// The entity this component is attached to.
    pub entity_id: EntityId,
    /// The registered tag of the component type.
    pub type_tag: TypeTag,
    /// The component payload.
    pub data: serde_json::Value,
    /// Monotonic version per (entity, tag) pair.
    pub version: u64,
    /// Wall-clock time of construction. Informational only.
    pub timestamp: Timestamp,
}

impl ComponentRecord {
    /// Constructs the initial record for a (entity, tag) pair, at
    /// version 0.
    #[must_use]
    pub fn new(entity_id: EntityId, type_tag: TypeTag, data: serde_json::Value) -> Self {
        Self {
            entity_id,
            type_tag,
            data,
            version: 0,
            timestamp: Timestamp::now(),
        }
    }

    /// Constructs the successor record: same (entity, tag), version + 1,
    /// fresh timestamp.
    #[must_use]
    pub fn next(&self, data: serde_json::Value) -> Self {
        Self {
            entity_id: self.entity_id,
            type_tag: self.type_tag.clone(),
            data,
            version: self.version + 1,
            timestamp: Timestamp::now(),
        }
    }

    /// Whether applying this record over `last_applied_version` would be
    /// an update rather than a stale no-op.
    #[must_use]
    pub fn supersedes(&self, last_applied_version: u64) -> bool {
        self.version > last_applied_version
    }

    /// The routing key this record is published on: the entity's
    /// `entity.<uuid>` key.
    #[must_use]
    pub fn routing_key(&self) -> String {
        self.entity_id.routing_key()
    }
}

/// Typed view over a [`ComponentRecord`] for a concrete payload type.
#[derive(Debug, Clone, PartialEq)]
pub struct Component<T> {
    /// The entity this component is attached to.
    pub entity_id: EntityId,
    /// The registered tag of the component type.
    pub type_tag: TypeTag,
    /// The decoded payload.
    pub data: T,
    /// Monotonic version per (entity, tag) pair.
    pub version: u64,
    /// Wall-clock time of construction.
    pub timestamp: Timestamp,
}

impl<T: Serialize> Component<T> {
    /// Constructs the initial component at version 0.
    pub fn new(entity_id: EntityId, type_tag: TypeTag, data: T) -> Self {
        Self {
            entity_id,
            type_tag,
            data,
            version: 0,
            timestamp: Timestamp::now(),
        }
    }

    /// Constructs the successor component: version + 1, fresh timestamp.
    pub fn next(&self, data: T) -> Self {
        Self {
            entity_id: self.entity_id,
            type_tag: self.type_tag.clone(),
            data,
            version: self.version + 1,
            timestamp: Timestamp::now(),
        }
    }

    /// Encodes into the wire envelope.
    pub fn encode(&self) -> crate::Result<ComponentRecord> {
        Ok(ComponentRecord {
            entity_id: self.entity_id,
            type_tag: self.type_tag.clone(),
            data: serde_json::to_value(&self.data)?,
            version: self.version,
            timestamp: self.timestamp,
        })
    }
}

impl<T: DeserializeOwned> Component<T> {
    /// Decodes a wire envelope into a typed component.
    pub fn decode(record: ComponentRecord) -> crate::Result<Self> {
        Ok(Self {
            entity_id: record.entity_id,
            type_tag: record.type_tag,
            data: serde_json::from_value(record.data)?,
            version: record.version,
            timestamp: record.timestamp,
        })
    }
}
