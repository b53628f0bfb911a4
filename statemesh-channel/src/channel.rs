//! The channel contract.
//!
//! A channel is the synchronization layer's only view of the broker:
//! publish an opaque payload to a subject, subscribe to a pattern, or
//! run a request/reply round trip. Any broker backend that implements
//! this trait can replace the in-process one.

use async_trait::async_trait;
use futures::Stream;
use std::any::Any;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::TransportResult;
use crate::subject::{Subject, SubjectPattern};

/// Opaque single-use token used to send a reply to an incoming request.
/// Each transport implementation wraps its own response channel inside.
pub struct ReplyToken(Box<dyn Any + Send + Sync>);

impl ReplyToken {
    /// Wraps a transport-specific response channel.
    pub fn new<T: Any + Send + Sync + 'static>(inner: T) -> Self {
        Self(Box::new(inner))
    }

    /// Unwraps back to the transport-specific type.
    pub fn downcast<T: Any + Send + Sync + 'static>(self) -> Option<T> {
        self.0.downcast::<T>().ok().map(|b| *b)
    }
}

impl std::fmt::Debug for ReplyToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ReplyToken")
    }
}

/// One message delivered to a subscriber.
#[derive(Debug)]
pub struct Delivery {
    /// The concrete subject the message was published on.
    pub subject: Subject,
    /// The opaque payload.
    pub payload: Vec<u8>,
    /// Present only for request traffic; consumed by
    /// [`Channel::respond`].
    pub reply: Option<ReplyToken>,
}

/// A live subscription: an infinite stream of deliveries.
///
/// Dropping the handle cancels the subscription; re-subscribing restarts
/// it. Deliveries arrive in publish order for this subscription.
pub struct Subscription {
    pattern: SubjectPattern,
    receiver: mpsc::UnboundedReceiver<Delivery>,
}

impl Subscription {
    /// Builds a subscription from its feeding channel. Transport
    /// implementations keep the sender side.
    pub fn new(pattern: SubjectPattern, receiver: mpsc::UnboundedReceiver<Delivery>) -> Self {
        Self { pattern, receiver }
    }

    /// The pattern this subscription was opened with.
    #[must_use]
    pub fn pattern(&self) -> &SubjectPattern {
        &self.pattern
    }

    /// Receives the next delivery. Returns `None` once the transport has
    /// torn the subscription down.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }
}

impl Stream for Subscription {
    type Item = Delivery;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Delivery>> {
        self.receiver.poll_recv(cx)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("pattern", &self.pattern)
            .finish()
    }
}

/// A publish/subscribe transport with request/reply.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Publishes a payload to a concrete subject. Delivered at least
    /// once to every matching active subscription.
    async fn publish(&self, subject: &Subject, payload: Vec<u8>) -> TransportResult<()>;

    /// Opens a subscription to a pattern.
    async fn subscribe(&self, pattern: &SubjectPattern) -> TransportResult<Subscription>;

    /// Sends a request to a subject and waits up to `timeout` for the
    /// first reply.
    async fn request(
        &self,
        subject: &Subject,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> TransportResult<Vec<u8>>;

    /// Sends a reply to a previously received request.
    async fn respond(&self, token: ReplyToken, payload: Vec<u8>) -> TransportResult<()>;
}
