//! The model: local state of the loop.

use statemesh_sync::ComponentStore;
use statemesh_types::{EntityId, TypeTag};
use std::collections::BTreeSet;

/// Health of the bridged transport, as the loop last observed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Connected,
    /// The bridge lost its stream and is retrying.
    Reconnecting,
    /// Terminal. Entered when the retry budget is spent.
    Disconnected,
}

/// Local state snapshot mutated only inside `update`.
///
/// Domain data (the store) is a downstream copy of published records;
/// everything else is UI-only and never feeds back into the domain
/// except through a command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    /// Applied component state, under the version rule.
    pub store: ComponentStore,
    /// Currently selected entity.
    pub selection: Option<EntityId>,
    /// Entities rendered expanded.
    pub expanded: BTreeSet<EntityId>,
    /// The standing query re-issued by refreshes.
    pub query_tags: Vec<TypeTag>,
    /// Result of the last completed standing query.
    pub matches: Vec<EntityId>,
    /// Transport health.
    pub connection: ConnectionStatus,
    /// Last diagnostic worth showing (decode failure, publish failure,
    /// query error).
    pub last_diagnostic: Option<String>,
    /// Delayed re-issues allowed per run of query failures; refilled by
    /// every successful query.
    pub query_retry_budget: u32,
    /// Remaining delayed re-issues.
    pub query_retries_left: u32,
}

impl Model {
    /// Creates a model with a standing query.
    #[must_use]
    pub fn new(query_tags: Vec<TypeTag>) -> Self {
        Self {
            query_tags,
            query_retry_budget: 2,
            query_retries_left: 2,
            ..Self::default()
        }
    }
}
