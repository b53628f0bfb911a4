//! Core type definitions for statemesh.
//!
//! This crate defines the fundamental, application-agnostic types used
//! throughout the synchronization layer:
//! - Entity identifiers (UUID v4) and their routing keys
//! - Registered component type tags
//! - The versioned, timestamped component envelope
//! - Per-entity aggregate state (attached tags + tombstone lifecycle)
//!
//! Application-specific component payloads (positions, velocities, task
//! models, etc.) belong to the processes that publish them, not here.

mod component;
mod entity_state;
mod ids;
mod tag;
mod timestamp;

pub use component::{Component, ComponentRecord};
pub use entity_state::EntityState;
pub use ids::EntityId;
pub use tag::TypeTag;
pub use timestamp::Timestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid type tag: {0}")]
    InvalidTypeTag(String),
}
