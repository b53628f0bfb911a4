//! Publish/subscribe transport layer for statemesh.
//!
//! Defines the routing-subject grammar, the [`Channel`] contract every
//! broker backend implements (publish, pattern subscribe, request/reply),
//! the JSON wire codec, and [`MemoryChannel`], a complete in-process
//! broker used both as the test double and as the single-process
//! deployment.
//!
//! # Contract
//!
//! - At-least-once delivery to every matching active subscription.
//! - Publish order is preserved per subscription; nothing is guaranteed
//!   across distinct subscribers.
//! - Dropping a [`Subscription`] handle is the sole cancellation
//!   mechanism; re-subscribing restarts the stream.
//! - Connection loss surfaces as a [`TransportError`] on the next
//!   operation. The channel never retries internally — retry policy
//!   belongs to the caller.

mod channel;
mod codec;
mod config;
mod error;
mod memory;
mod subject;

pub use channel::{Channel, Delivery, ReplyToken, Subscription};
pub use codec::{decode_payload, encode_payload, DecodeError, MAX_PAYLOAD_SIZE};
pub use config::ChannelConfig;
pub use error::{TransportError, TransportResult};
pub use memory::{MemoryBroker, MemoryChannel};
pub use subject::{Subject, SubjectError, SubjectPattern};
