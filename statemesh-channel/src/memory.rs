//! In-process broker.
//!
//! [`MemoryBroker`] implements the full channel contract inside one
//! process: wildcard fan-out, per-subscription ordering, request/reply,
//! and the authentication gate. It serves as the test double for every
//! suite in the workspace and as the single-process deployment; an
//! external broker backend replaces it by implementing [`Channel`].

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::channel::{Channel, Delivery, ReplyToken, Subscription};
use crate::config::ChannelConfig;
use crate::error::{TransportError, TransportResult};
use crate::subject::{Subject, SubjectPattern};

/// One registered subscription inside the broker.
struct SubEntry {
    id: u64,
    pattern: SubjectPattern,
    sender: mpsc::UnboundedSender<Delivery>,
}

struct BrokerInner {
    auth_token: String,
    subscriptions: Mutex<Vec<SubEntry>>,
    next_sub_id: AtomicU64,
    shut_down: AtomicBool,
}

/// The broker side: owns the subscription table and hands out connected
/// channels.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

impl MemoryBroker {
    /// Creates a broker that accepts the given credential.
    #[must_use]
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                auth_token: auth_token.into(),
                subscriptions: Mutex::new(Vec::new()),
                next_sub_id: AtomicU64::new(0),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Connects a channel, verifying the credential first. Nothing
    /// succeeds on the returned channel without this gate.
    pub fn connect(&self, config: &ChannelConfig) -> TransportResult<MemoryChannel> {
        if config.auth_token != self.inner.auth_token {
            return Err(TransportError::Unauthorized(format!(
                "bad token for endpoint {}",
                config.endpoint
            )));
        }
        debug!("channel connected to {}", config.endpoint);
        Ok(MemoryChannel {
            inner: self.inner.clone(),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Shuts the broker down: every subscription stream ends and every
    /// subsequent operation fails with `ConnectionLost`.
    pub fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::SeqCst);
        self.inner
            .subscriptions
            .lock()
            .expect("subscription table poisoned")
            .clear();
        debug!("broker shut down");
    }

    /// Number of live subscriptions (stale entries pruned).
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        let mut subs = self
            .inner
            .subscriptions
            .lock()
            .expect("subscription table poisoned");
        subs.retain(|entry| !entry.sender.is_closed());
        subs.len()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(String::new())
    }
}

/// Reply channel wrapped inside a [`ReplyToken`] by this transport.
struct MemoryReply {
    sender: mpsc::Sender<Vec<u8>>,
}

/// A connected channel onto a [`MemoryBroker`].
#[derive(Clone)]
pub struct MemoryChannel {
    inner: Arc<BrokerInner>,
    closed: Arc<AtomicBool>,
}

impl MemoryChannel {
    /// Closes this channel locally. Subsequent operations fail with
    /// `ChannelClosed`; other channels on the broker are unaffected.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn check_open(&self) -> TransportResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::ChannelClosed);
        }
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionLost("broker shut down".into()));
        }
        Ok(())
    }

    /// Fans a message out to every matching subscription. Returns how
    /// many subscriptions it reached.
    fn fan_out(&self, subject: &Subject, payload: &[u8], reply: &Option<mpsc::Sender<Vec<u8>>>) -> usize {
        let mut subs = self
            .inner
            .subscriptions
            .lock()
            .expect("subscription table poisoned");
        subs.retain(|entry| !entry.sender.is_closed());

        let mut reached = 0;
        for entry in subs.iter() {
            if !entry.pattern.matches(subject) {
                continue;
            }
            let delivery = Delivery {
                subject: subject.clone(),
                payload: payload.to_vec(),
                reply: reply
                    .as_ref()
                    .map(|sender| ReplyToken::new(MemoryReply { sender: sender.clone() })),
            };
            if entry.sender.send(delivery).is_ok() {
                reached += 1;
            }
        }
        trace!("published to '{subject}', reached {reached} subscriptions");
        reached
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn publish(&self, subject: &Subject, payload: Vec<u8>) -> TransportResult<()> {
        self.check_open()?;
        self.fan_out(subject, &payload, &None);
        Ok(())
    }

    async fn subscribe(&self, pattern: &SubjectPattern) -> TransportResult<Subscription> {
        self.check_open()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_sub_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscriptions
            .lock()
            .expect("subscription table poisoned")
            .push(SubEntry {
                id,
                pattern: pattern.clone(),
                sender: tx,
            });
        debug!("subscription {id} opened on '{pattern}'");
        Ok(Subscription::new(pattern.clone(), rx))
    }

    async fn request(
        &self,
        subject: &Subject,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> TransportResult<Vec<u8>> {
        self.check_open()?;
        // First reply wins; capacity 1 so late replies are discarded.
        let (tx, mut rx) = mpsc::channel(1);
        self.fan_out(subject, &payload, &Some(tx));

        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(reply)) => Ok(reply),
            // Every token holder dropped without answering: report it the
            // same way as an elapsed wait — no responder answered in time.
            Ok(None) => Err(TransportError::Timeout),
            Err(_) => Err(TransportError::Timeout),
        }
    }

    async fn respond(&self, token: ReplyToken, payload: Vec<u8>) -> TransportResult<()> {
        self.check_open()?;
        let Some(reply) = token.downcast::<MemoryReply>() else {
            return Err(TransportError::RequestFailed(
                "reply token from a different transport".into(),
            ));
        };
        // A full or closed slot means another responder already won.
        if reply.sender.try_send(payload).is_err() {
            debug!("discarding late reply");
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryChannel")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}
