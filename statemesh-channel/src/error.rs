//! Error types for the transport layer.

use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors surfaced by a [`crate::Channel`] implementation.
///
/// These are surfaced to the caller and never silently swallowed; the
/// channel does not retry internally.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection to the broker was lost. Surfaces on the next
    /// operation after the loss.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// A publish could not be completed.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// A subscription could not be opened.
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),

    /// A request could not be sent or its reply channel broke.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// No responder answered a request within its timeout.
    #[error("request timed out")]
    Timeout,

    /// The credentials were rejected; nothing succeeds before
    /// authentication.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The channel was closed locally.
    #[error("channel closed")]
    ChannelClosed,
}
