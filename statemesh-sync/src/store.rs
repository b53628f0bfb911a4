//! Applied component state.
//!
//! The store holds the latest applied record per (entity, tag) pair and
//! the per-entity aggregate. It enforces the version rule: an inbound
//! record whose version is not greater than the one already held for its
//! pair is discarded as a silent no-op. The rule must hold under the
//! transport's out-of-order and duplicated delivery, which it does
//! because it never consults timestamps or arrival order.

use serde::{Deserialize, Serialize};
use statemesh_types::{ComponentRecord, EntityId, EntityState, TypeTag};
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

/// Outcome of applying an inbound component record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The record was newer and replaced the held state.
    Applied,
    /// The record's version was not greater than the held one.
    /// A defined no-op, not an error.
    Stale,
}

impl ApplyOutcome {
    /// Whether the store was modified.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Latest applied component per (entity, tag) plus entity aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentStore {
    components: HashMap<EntityId, BTreeMap<TypeTag, ComponentRecord>>,
    entities: HashMap<EntityId, EntityState>,
}

impl ComponentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an inbound record under the version rule.
    ///
    /// The first record for a pair always applies (any version);
    /// afterwards only strictly greater versions do. Applying also
    /// attaches the tag on the entity aggregate, creating or reviving
    /// the aggregate as needed.
    pub fn apply(&mut self, record: ComponentRecord) -> ApplyOutcome {
        let held = self
            .components
            .get(&record.entity_id)
            .and_then(|tags| tags.get(&record.type_tag));

        if let Some(held) = held {
            if !record.supersedes(held.version) {
                trace!(
                    "stale record for ({}, {}): v{} <= v{}",
                    record.entity_id,
                    record.type_tag,
                    record.version,
                    held.version
                );
                return ApplyOutcome::Stale;
            }
        }

        let entity_id = record.entity_id;
        let tag = record.type_tag.clone();
        self.components
            .entry(entity_id)
            .or_default()
            .insert(tag.clone(), record);
        self.entities
            .entry(entity_id)
            .or_insert_with(|| EntityState::new(entity_id))
            .attach(tag);
        ApplyOutcome::Applied
    }

    /// Detaches a component type from an entity. Drops the held record,
    /// bumps the aggregate, and tombstones the entity when its last
    /// component detaches. Returns true if the tag was attached.
    pub fn detach(&mut self, entity_id: &EntityId, tag: &TypeTag) -> bool {
        let removed = self
            .components
            .get_mut(entity_id)
            .is_some_and(|tags| tags.remove(tag).is_some());
        if removed {
            if let Some(state) = self.entities.get_mut(entity_id) {
                state.detach(tag);
            }
        }
        removed
    }

    /// The latest applied record for a pair.
    #[must_use]
    pub fn get(&self, entity_id: &EntityId, tag: &TypeTag) -> Option<&ComponentRecord> {
        self.components.get(entity_id)?.get(tag)
    }

    /// The applied version for a pair.
    #[must_use]
    pub fn version(&self, entity_id: &EntityId, tag: &TypeTag) -> Option<u64> {
        self.get(entity_id, tag).map(|record| record.version)
    }

    /// The aggregate state for an entity, if it has ever held a
    /// component.
    #[must_use]
    pub fn entity(&self, entity_id: &EntityId) -> Option<&EntityState> {
        self.entities.get(entity_id)
    }

    /// All records attached to an entity, in tag order.
    pub fn components_of(
        &self,
        entity_id: &EntityId,
    ) -> impl Iterator<Item = &ComponentRecord> {
        self.components
            .get(entity_id)
            .into_iter()
            .flat_map(|tags| tags.values())
    }

    /// Live entities carrying every tag in `tags`, ordered by id.
    /// Read-only; tombstoned entities never match.
    #[must_use]
    pub fn entities_with<'a>(
        &self,
        tags: impl IntoIterator<Item = &'a TypeTag> + Clone,
    ) -> Vec<EntityId> {
        let mut matches: Vec<EntityId> = self
            .entities
            .values()
            .filter(|state| state.is_live() && state.has_all(tags.clone()))
            .map(|state| state.entity_id)
            .collect();
        matches.sort();
        matches
    }

    /// All entity aggregates (live and tombstoned).
    pub fn entity_states(&self) -> impl Iterator<Item = &EntityState> {
        self.entities.values()
    }

    /// Number of entities ever seen (including tombstoned).
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}
