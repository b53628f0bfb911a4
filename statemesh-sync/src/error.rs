//! Error types for the synchronization layer.

use statemesh_channel::{DecodeError, TransportError};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport failure, surfaced from the channel.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Payload could not be encoded or decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A subscription ended while still needed.
    #[error("subscription closed: {0}")]
    SubscriptionClosed(String),
}

/// Errors returned from [`crate::QueryEngine::query`].
///
/// A version conflict is never an error; it is the silent
/// [`crate::ApplyOutcome::Stale`] no-op.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// No responder answered within the query timeout.
    #[error("query timed out")]
    Timeout,

    /// The reply could not be decoded, or the query itself could not be
    /// formed.
    #[error("malformed query reply: {0}")]
    Malformed(String),

    /// Transport failure other than a timeout.
    #[error("query transport failure: {0}")]
    Transport(String),
}
