//! The pure view function.
//!
//! Projects the model into a UI description. One-way: nothing here
//! mutates anything, and nothing in the view model feeds back into the
//! domain without going through a command.

use statemesh_types::{EntityId, TypeTag};

use crate::model::{ConnectionStatus, Model};

/// One component on a row.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentLine {
    pub tag: TypeTag,
    pub version: u64,
    /// Compact payload rendering; present only on expanded rows.
    pub data: Option<String>,
}

/// One entity row.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRow {
    pub entity_id: EntityId,
    pub selected: bool,
    pub expanded: bool,
    pub tombstoned: bool,
    /// Whether the standing query matched this entity last time it ran.
    pub matched: bool,
    pub components: Vec<ComponentLine>,
}

/// The rendered state description.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel {
    pub rows: Vec<EntityRow>,
    pub status: String,
    pub diagnostic: Option<String>,
}

/// Renders the model. Pure: same model, same view.
#[must_use]
pub fn view(model: &Model) -> ViewModel {
    let mut rows: Vec<EntityRow> = model
        .store
        .entity_states()
        .map(|state| {
            let expanded = model.expanded.contains(&state.entity_id);
            let components = model
                .store
                .components_of(&state.entity_id)
                .map(|record| ComponentLine {
                    tag: record.type_tag.clone(),
                    version: record.version,
                    data: expanded.then(|| record.data.to_string()),
                })
                .collect();
            EntityRow {
                entity_id: state.entity_id,
                selected: model.selection == Some(state.entity_id),
                expanded,
                tombstoned: state.tombstoned,
                matched: model.matches.contains(&state.entity_id),
                components,
            }
        })
        .collect();
    rows.sort_by_key(|row| row.entity_id);

    let status = match model.connection {
        ConnectionStatus::Connected => format!(
            "connected · {} entities · {} matching",
            rows.len(),
            model.matches.len()
        ),
        ConnectionStatus::Reconnecting => "reconnecting…".to_string(),
        ConnectionStatus::Disconnected => "disconnected".to_string(),
    };

    ViewModel {
        rows,
        status,
        diagnostic: model.last_diagnostic.clone(),
    }
}
