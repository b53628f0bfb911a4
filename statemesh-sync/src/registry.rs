//! The entity registry task.
//!
//! One process runs the registry: a single-owner task that folds every
//! published entity event into its private [`ComponentStore`] and
//! answers `query.>` and `registry.<tag>` requests over request/reply.
//! There is no global mutable singleton anywhere — other processes reach
//! this state only as a network query through the channel, and mutation
//! is serialized by task ownership.

use statemesh_channel::{
    decode_payload, encode_payload, Channel, Delivery, Subject, SubjectPattern,
};
use statemesh_types::TypeTag;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::SyncResult;
use crate::protocol::{EntityEvent, ErrorReply, QueryReply, RegistryReply, RegistryRequest};
use crate::store::ComponentStore;

/// Handle to a spawned registry task.
pub struct RegistryHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<ComponentStore>,
}

impl RegistryHandle {
    /// Stops the registry and returns its final store snapshot.
    pub async fn stop(mut self) -> ComponentStore {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task.await.unwrap_or_default()
    }
}

/// The registry: entity-event consumer plus query/membership responder.
pub struct EntityRegistry {
    channel: Arc<dyn Channel>,
    store: ComponentStore,
}

impl EntityRegistry {
    /// Creates a registry over a channel with an empty store.
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self {
            channel,
            store: ComponentStore::new(),
        }
    }

    /// Subscribes to entity events and request subjects, then runs the
    /// registry as a dedicated task.
    pub async fn spawn(channel: Arc<dyn Channel>) -> SyncResult<RegistryHandle> {
        let mut registry = Self::new(channel.clone());
        let mut events = channel
            .subscribe(&SubjectPattern::new("entity.>").expect("static pattern"))
            .await?;
        let mut queries = channel
            .subscribe(&SubjectPattern::new("query.>").expect("static pattern"))
            .await?;
        let mut lookups = channel
            .subscribe(&SubjectPattern::new("registry.*").expect("static pattern"))
            .await?;

        let (stop_tx, mut stop_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            info!("entity registry running");
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    maybe = events.recv() => match maybe {
                        Some(delivery) => registry.handle_entity_event(&delivery),
                        None => break,
                    },
                    maybe = queries.recv() => match maybe {
                        Some(delivery) => registry.handle_query(delivery).await,
                        None => break,
                    },
                    maybe = lookups.recv() => match maybe {
                        Some(delivery) => registry.handle_lookup(delivery).await,
                        None => break,
                    },
                }
            }
            info!("entity registry stopped");
            registry.store
        });

        Ok(RegistryHandle {
            stop: Some(stop_tx),
            task,
        })
    }

    /// Folds a published entity event into the store.
    fn handle_entity_event(&mut self, delivery: &Delivery) {
        match decode_payload::<EntityEvent>(&delivery.payload) {
            Ok(EntityEvent::Component(record)) => {
                let outcome = self.store.apply(record);
                debug!("entity event on '{}': {:?}", delivery.subject, outcome);
            }
            Ok(EntityEvent::Detached {
                entity_id,
                type_tag,
                ..
            }) => {
                self.store.detach(&entity_id, &type_tag);
                debug!("detached {type_tag} from {entity_id}");
            }
            Err(e) => {
                // The registry has no UI to surface this on; log and
                // keep consuming.
                warn!("undecodable entity event on '{}': {e}", delivery.subject);
            }
        }
    }

    /// Answers a `query.<tags…>` request.
    async fn handle_query(&mut self, delivery: Delivery) {
        let Some(reply) = delivery.reply else {
            warn!("query on '{}' carried no reply token", delivery.subject);
            return;
        };

        let payload = match Self::parse_query_tags(&delivery.subject) {
            Ok(tags) => {
                let entity_ids = self.store.entities_with(tags.iter());
                encode_payload(&QueryReply { entity_ids })
            }
            Err(detail) => encode_payload(&ErrorReply::new(400, detail)),
        };

        match payload {
            Ok(payload) => {
                if let Err(e) = self.channel.respond(reply, payload).await {
                    warn!("failed to answer query '{}': {e}", delivery.subject);
                }
            }
            Err(e) => warn!("failed to encode query reply: {e}"),
        }
    }

    /// Answers a `registry.<tag>` request.
    async fn handle_lookup(&mut self, delivery: Delivery) {
        let Some(reply) = delivery.reply else {
            warn!("lookup on '{}' carried no reply token", delivery.subject);
            return;
        };

        let payload = match self.serve_lookup(&delivery.subject, &delivery.payload) {
            Ok(reply_body) => encode_payload(&reply_body),
            Err(detail) => encode_payload(&ErrorReply::new(400, detail)),
        };

        match payload {
            Ok(payload) => {
                if let Err(e) = self.channel.respond(reply, payload).await {
                    warn!("failed to answer lookup '{}': {e}", delivery.subject);
                }
            }
            Err(e) => warn!("failed to encode lookup reply: {e}"),
        }
    }

    fn serve_lookup(
        &mut self,
        subject: &Subject,
        payload: &[u8],
    ) -> Result<RegistryReply, String> {
        let tag = Self::parse_registry_tag(subject)?;
        let request: RegistryRequest =
            decode_payload(payload).map_err(|e| format!("undecodable request: {e}"))?;
        match request {
            RegistryRequest::List => Ok(RegistryReply::Listed {
                entity_ids: self.store.entities_with([&tag]),
            }),
            RegistryRequest::Detach { entity_id } => Ok(RegistryReply::Detached {
                removed: self.store.detach(&entity_id, &tag),
            }),
        }
    }

    /// Extracts and validates the tags of a `query.<tags…>` subject.
    fn parse_query_tags(subject: &Subject) -> Result<Vec<TypeTag>, String> {
        let mut segments = subject.segments();
        if segments.next() != Some("query") {
            return Err(format!("'{subject}' is not a query subject"));
        }
        let tags: Result<Vec<TypeTag>, _> = segments.map(TypeTag::from_str).collect();
        let tags = tags.map_err(|e| e.to_string())?;
        if tags.is_empty() {
            return Err("query subject names no tags".into());
        }
        Ok(tags)
    }

    /// Extracts the tag of a `registry.<tag>` subject.
    fn parse_registry_tag(subject: &Subject) -> Result<TypeTag, String> {
        let mut segments = subject.segments();
        if segments.next() != Some("registry") {
            return Err(format!("'{subject}' is not a registry subject"));
        }
        let tag = segments
            .next()
            .ok_or_else(|| "registry subject names no tag".to_string())?;
        TypeTag::from_str(tag).map_err(|e| e.to_string())
    }
}
