//! Entity queries over request/reply.
//!
//! A query names a set of required component types and returns the live
//! entities carrying all of them. The subject is canonical — tags are
//! sorted before joining — so semantically identical queries always
//! target the same responder. Queries are read-only and never mutate
//! entity state.

use statemesh_channel::{decode_payload, encode_payload, Channel, Subject, TransportError};
use statemesh_types::{EntityId, TypeTag};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::QueryError;
use crate::protocol::{QueryReply, RegistryReply, RegistryRequest};

/// Tuning for the query engine.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Bound on each request round trip.
    pub timeout: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }
}

/// Issues entity queries over the channel.
#[derive(Clone)]
pub struct QueryEngine {
    channel: Arc<dyn Channel>,
    config: QueryConfig,
}

impl QueryEngine {
    /// Creates a query engine over a channel.
    pub fn new(channel: Arc<dyn Channel>, config: QueryConfig) -> Self {
        Self { channel, config }
    }

    /// Returns the live entities carrying every tag in `tags`, ordered
    /// by id.
    ///
    /// `Err(Timeout)` when no responder answers within the configured
    /// bound; `Err(Malformed)` when the reply cannot be decoded.
    pub async fn query(&self, tags: &[TypeTag]) -> Result<Vec<EntityId>, QueryError> {
        if tags.is_empty() {
            return Err(QueryError::Malformed(
                "a query requires at least one type tag".into(),
            ));
        }
        let subject = Subject::query(tags.iter());
        debug!("querying '{subject}'");
        let reply = self.request(&subject, Vec::new()).await?;
        let reply: QueryReply = decode_payload(&reply)
            .map_err(|e| QueryError::Malformed(e.to_string()))?;
        Ok(reply.entity_ids)
    }

    /// Single-tag membership lookup over the registry subject.
    pub async fn members(&self, tag: &TypeTag) -> Result<Vec<EntityId>, QueryError> {
        let subject = Subject::registry(tag);
        let payload = encode_payload(&RegistryRequest::List)
            .map_err(|e| QueryError::Malformed(e.to_string()))?;
        let reply = self.request(&subject, payload).await?;
        match decode_payload::<RegistryReply>(&reply) {
            Ok(RegistryReply::Listed { entity_ids }) => Ok(entity_ids),
            Ok(other) => Err(QueryError::Malformed(format!(
                "unexpected registry reply: {other:?}"
            ))),
            Err(e) => Err(QueryError::Malformed(e.to_string())),
        }
    }

    async fn request(&self, subject: &Subject, payload: Vec<u8>) -> Result<Vec<u8>, QueryError> {
        self.channel
            .request(subject, payload, self.config.timeout)
            .await
            .map_err(|e| match e {
                TransportError::Timeout => QueryError::Timeout,
                other => QueryError::Transport(other.to_string()),
            })
    }
}
