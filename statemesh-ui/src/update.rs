//! The pure update function.

use std::time::Duration;
use tracing::trace;

use crate::command::Command;
use crate::message::Message;
use crate::model::{ConnectionStatus, Model};

/// Pause before a failed standing query is re-issued.
pub const QUERY_RETRY_DELAY: Duration = Duration::from_millis(750);

/// Applies one message to the model and returns the side effects to
/// run.
///
/// Total, synchronous, and deterministic: replaying the same ordered
/// message sequence from the same initial model always yields the same
/// final model, which is what makes the loop testable without a live
/// broker. Stale component versions are silent no-ops. Once the model
/// is disconnected the loop is terminal: every further message is
/// ignored and no commands are issued.
pub fn update(model: &mut Model, message: Message) -> Vec<Command> {
    if model.connection == ConnectionStatus::Disconnected {
        trace!("disconnected; dropping {message:?}");
        return Vec::new();
    }

    match message {
        Message::Component(record) => {
            let outcome = model.store.apply(record);
            trace!("component message: {outcome:?}");
            Vec::new()
        }

        Message::Detached {
            entity_id,
            type_tag,
        } => {
            model.store.detach(&entity_id, &type_tag);
            Vec::new()
        }

        Message::QueryResult { tags, outcome } => {
            // Results for a superseded standing query are ignored.
            if tags != model.query_tags {
                return Vec::new();
            }
            match outcome {
                Ok(entity_ids) => {
                    model.matches = entity_ids;
                    model.last_diagnostic = None;
                    model.query_retries_left = model.query_retry_budget;
                    Vec::new()
                }
                Err(e) => {
                    model.last_diagnostic = Some(e.to_string());
                    // Bounded, delayed re-issue; the budget refills on
                    // the next success.
                    if model.query_retries_left > 0 {
                        model.query_retries_left -= 1;
                        vec![Command::Timer {
                            delay: QUERY_RETRY_DELAY,
                            message: Box::new(Message::Refresh),
                        }]
                    } else {
                        Vec::new()
                    }
                }
            }
        }

        Message::DecodeFailed { subject, detail } => {
            model.last_diagnostic = Some(format!("undecodable event on '{subject}': {detail}"));
            Vec::new()
        }

        Message::PublishFailed { subject, detail } => {
            model.last_diagnostic = Some(format!("publish to '{subject}' failed: {detail}"));
            Vec::new()
        }

        Message::TransportLost { detail } => {
            model.connection = ConnectionStatus::Reconnecting;
            model.last_diagnostic = Some(detail);
            Vec::new()
        }

        Message::Reconnected => {
            model.connection = ConnectionStatus::Connected;
            model.last_diagnostic = None;
            // The stream had a gap; re-issue the standing query to
            // resync membership.
            if model.query_tags.is_empty() {
                Vec::new()
            } else {
                vec![Command::Query {
                    tags: model.query_tags.clone(),
                }]
            }
        }

        Message::Disconnected => {
            model.connection = ConnectionStatus::Disconnected;
            Vec::new()
        }

        Message::EditComponent {
            entity_id,
            type_tag,
            data,
        } => {
            // Successor of whatever we hold; first edit starts at 0.
            let version = model
                .store
                .version(&entity_id, &type_tag)
                .map_or(0, |held| held + 1);
            vec![Command::PublishUpdate {
                entity_id,
                type_tag,
                data,
                version,
            }]
        }

        Message::RemoveComponent {
            entity_id,
            type_tag,
        } => {
            if model.store.get(&entity_id, &type_tag).is_some() {
                vec![Command::PublishDetach {
                    entity_id,
                    type_tag,
                }]
            } else {
                Vec::new()
            }
        }

        Message::Select(entity_id) => {
            model.selection = Some(entity_id);
            Vec::new()
        }

        Message::ToggleExpand(entity_id) => {
            if !model.expanded.remove(&entity_id) {
                model.expanded.insert(entity_id);
            }
            Vec::new()
        }

        Message::Refresh => {
            if model.query_tags.is_empty() {
                Vec::new()
            } else {
                vec![Command::Query {
                    tags: model.query_tags.clone(),
                }]
            }
        }
    }
}
