//! The message bridge.
//!
//! One forwarding task per managed subscription: decode each delivery,
//! map it 1:1 onto a [`Message`], and enqueue it on the loop's single
//! inbound channel. The task is the only writer for its subscription,
//! so per-subscription delivery order is preserved; nothing is
//! guaranteed across subscriptions. Decode failures become
//! [`Message::DecodeFailed`] instead of being dropped.

use statemesh_channel::{decode_payload, Delivery, SubjectPattern};
use statemesh_sync::{ComponentCache, EntityEvent, SubscriptionHandle, SubscriptionManager};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::message::Message;

/// Reconnection policy for [`MessageBridge::attach_resilient`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Re-subscribe attempts before giving up with
    /// [`Message::Disconnected`].
    pub budget: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            budget: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Forwards subscription deliveries into the update loop's inbox.
#[derive(Clone)]
pub struct MessageBridge {
    inbox: mpsc::UnboundedSender<Message>,
    cache: Option<Arc<Mutex<ComponentCache>>>,
}

impl MessageBridge {
    /// Creates a bridge feeding the given inbox.
    pub fn new(inbox: mpsc::UnboundedSender<Message>) -> Self {
        Self { inbox, cache: None }
    }

    /// Also records every applied component into a shared cache, so hot
    /// entries survive subscription pruning.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<Mutex<ComponentCache>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Maps one delivery onto its message.
    #[must_use]
    pub fn map_delivery(delivery: &Delivery) -> Message {
        match decode_payload::<EntityEvent>(&delivery.payload) {
            Ok(EntityEvent::Component(record)) => Message::Component(record),
            Ok(EntityEvent::Detached {
                entity_id,
                type_tag,
                ..
            }) => Message::Detached {
                entity_id,
                type_tag,
            },
            Err(e) => Message::DecodeFailed {
                subject: delivery.subject.clone(),
                detail: e.to_string(),
            },
        }
    }

    /// Spawns the forwarding task for one handle. The task ends when
    /// the subscription drains or the loop goes away.
    pub fn attach(&self, mut handle: SubscriptionHandle) -> JoinHandle<()> {
        let inbox = self.inbox.clone();
        let cache = self.cache.clone();
        tokio::spawn(async move {
            while let Some(delivery) = handle.recv().await {
                let message = Self::map_delivery(&delivery);
                if let (Some(cache), Message::Component(record)) = (&cache, &message) {
                    cache
                        .lock()
                        .expect("component cache poisoned")
                        .insert(record.clone());
                }
                if inbox.send(message).is_err() {
                    debug!("inbox closed; bridge task for '{}' ending", handle.pattern());
                    return;
                }
            }
            debug!("subscription '{}' ended", handle.pattern());
        })
    }

    /// Spawns a self-healing forwarding task: it (re-)subscribes
    /// through the manager, pumps until the stream ends, and retries
    /// within the policy's budget. Each loss feeds
    /// [`Message::TransportLost`], each recovery
    /// [`Message::Reconnected`], and budget exhaustion the terminal
    /// [`Message::Disconnected`].
    pub fn attach_resilient(
        &self,
        manager: SubscriptionManager,
        pattern: SubjectPattern,
        policy: RetryPolicy,
    ) -> JoinHandle<()> {
        let inbox = self.inbox.clone();
        let bridge = self.clone();
        tokio::spawn(async move {
            let mut remaining = policy.budget;
            let mut recovering = false;
            loop {
                match manager.subscribe(&pattern).await {
                    Ok(mut handle) => {
                        if recovering && inbox.send(Message::Reconnected).is_err() {
                            return;
                        }
                        while let Some(delivery) = handle.recv().await {
                            let message = Self::map_delivery(&delivery);
                            if let (Some(cache), Message::Component(record)) =
                                (&bridge.cache, &message)
                            {
                                cache
                                    .lock()
                                    .expect("component cache poisoned")
                                    .insert(record.clone());
                            }
                            if inbox.send(message).is_err() {
                                return;
                            }
                        }
                        warn!("subscription '{pattern}' stream ended");
                    }
                    Err(e) => {
                        warn!("re-subscribe to '{pattern}' failed: {e}");
                    }
                }

                if remaining == 0 {
                    let _ = inbox.send(Message::Disconnected);
                    return;
                }
                remaining -= 1;
                recovering = true;
                if inbox
                    .send(Message::TransportLost {
                        detail: format!("subscription '{pattern}' lost"),
                    })
                    .is_err()
                {
                    return;
                }
                tokio::time::sleep(policy.backoff).await;
            }
        })
    }
}
