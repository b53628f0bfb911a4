//! Component cache.
//!
//! A bounded cache sitting in front of the channel. Eviction is driven
//! by update-frequency score, not recency alone: an entry that updates
//! often is retained even when nobody has read it lately, because losing
//! it means a resubscription or a query round trip to get it back.

use statemesh_types::{ComponentRecord, EntityId, TypeTag};
use std::collections::HashMap;

/// Counters describing cache behavior so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct CacheEntry {
    record: ComponentRecord,
    /// How many inserts have landed on this key.
    update_count: u64,
    /// Logical time of the last insert (monotonic op counter).
    last_update: u64,
}

/// Bounded, update-frequency-scored component cache.
///
/// Not internally synchronized: own it from one task or wrap it in a
/// mutex, like the subscription table.
pub struct ComponentCache {
    capacity: usize,
    entries: HashMap<(EntityId, TypeTag), CacheEntry>,
    clock: u64,
    stats: CacheStats,
}

impl ComponentCache {
    /// Creates a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            clock: 0,
            stats: CacheStats::default(),
        }
    }

    /// Inserts or refreshes the entry for the record's (entity, tag)
    /// pair, bumping its update frequency. Evicts the
    /// least-frequently-updated entry (ties broken by older last
    /// update) when full.
    pub fn insert(&mut self, record: ComponentRecord) {
        self.clock += 1;
        let key = (record.entity_id, record.type_tag.clone());

        if let Some(entry) = self.entries.get_mut(&key) {
            entry.record = record;
            entry.update_count += 1;
            entry.last_update = self.clock;
            return;
        }

        if self.entries.len() >= self.capacity {
            self.evict_one();
        }
        self.entries.insert(
            key,
            CacheEntry {
                record,
                update_count: 1,
                last_update: self.clock,
            },
        );
    }

    /// Looks up the cached record for a pair. Reads do not count as
    /// updates — they do not protect an entry from eviction.
    pub fn get(&mut self, entity_id: &EntityId, tag: &TypeTag) -> Option<&ComponentRecord> {
        match self.entries.get(&(*entity_id, tag.clone())) {
            Some(entry) => {
                self.stats.hits += 1;
                Some(&entry.record)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Drops the entry for a pair (e.g. after a detach).
    pub fn remove(&mut self, entity_id: &EntityId, tag: &TypeTag) -> Option<ComponentRecord> {
        self.entries
            .remove(&(*entity_id, tag.clone()))
            .map(|entry| entry.record)
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Behavior counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn evict_one(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| (entry.update_count, entry.last_update))
            .map(|(key, _)| key.clone());
        if let Some(key) = victim {
            self.entries.remove(&key);
            self.stats.evictions += 1;
        }
    }
}

impl std::fmt::Debug for ComponentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentCache")
            .field("capacity", &self.capacity)
            .field("len", &self.entries.len())
            .field("stats", &self.stats)
            .finish()
    }
}
