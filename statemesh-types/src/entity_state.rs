//! Per-entity aggregate state.
//!
//! Tracks which component types are currently attached to an entity, for
//! existence and membership queries. An entity's state is created on the
//! first attachment and never physically deleted: detaching the last
//! component tombstones it, and a later attach revives it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{EntityId, TypeTag};

/// Aggregate of the component types attached to one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityState {
    /// The entity this aggregate describes.
    pub entity_id: EntityId,
    /// Tags of the component types currently attached.
    pub attached: BTreeSet<TypeTag>,
    /// Bumped on every attach and detach.
    pub aggregate_version: u64,
    /// Set when the last component detaches; cleared on revival.
    pub tombstoned: bool,
}

impl EntityState {
    /// Creates the aggregate for a newly seen entity (no components yet).
    #[must_use]
    pub fn new(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            attached: BTreeSet::new(),
            aggregate_version: 0,
            tombstoned: false,
        }
    }

    /// Records a component attachment. Bumps the aggregate version and
    /// revives a tombstoned entity. Returns true if the tag was newly
    /// attached.
    pub fn attach(&mut self, tag: TypeTag) -> bool {
        let added = self.attached.insert(tag);
        if added {
            self.aggregate_version += 1;
            self.tombstoned = false;
        }
        added
    }

    /// Records a component detachment. Bumps the aggregate version and
    /// tombstones the entity when the last tag detaches. Returns true if
    /// the tag was attached.
    pub fn detach(&mut self, tag: &TypeTag) -> bool {
        let removed = self.attached.remove(tag);
        if removed {
            self.aggregate_version += 1;
            if self.attached.is_empty() {
                self.tombstoned = true;
            }
        }
        removed
    }

    /// Whether the given tag is currently attached.
    #[must_use]
    pub fn has(&self, tag: &TypeTag) -> bool {
        self.attached.contains(tag)
    }

    /// Whether every tag in `tags` is currently attached.
    #[must_use]
    pub fn has_all<'a>(&self, tags: impl IntoIterator<Item = &'a TypeTag>) -> bool {
        tags.into_iter().all(|t| self.attached.contains(t))
    }

    /// Whether the entity is live (has at least one attached component).
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.tombstoned && !self.attached.is_empty()
    }
}
