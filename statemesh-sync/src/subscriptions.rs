//! Subscription ownership and lifecycle.
//!
//! The manager owns every live subscription. Subscriptions are keyed by
//! pattern: subscribing to an equal pattern returns another handle onto
//! the same transport subscription (reference-counted), so the broker
//! only ever sees one. Handles re-broadcast deliveries in publish order.
//!
//! Lifecycle per subscription: `Requested → Active → Draining → Closed`.
//! Dropping the last handle drains the subscription (no new deliveries)
//! and then tears the transport subscription down. [`SubscriptionManager::optimize`]
//! additionally force-drains subscriptions whose delivery rate has
//! fallen below the configured threshold — a deliberate cost/freshness
//! trade-off: pruned patterns lose real-time updates until something
//! re-subscribes.

use statemesh_channel::{Channel, Delivery, SubjectPattern};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Notify};
use tracing::{debug, warn};

use crate::error::SyncResult;

/// Lifecycle state of one managed subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Transport subscription opened, pump not yet running.
    Requested,
    /// Delivering events to handles.
    Active,
    /// No longer delivering new events; in-flight handling finishes,
    /// then the transport subscription is torn down.
    Draining,
    /// Torn down. The table entry is removed at this point.
    Closed,
}

/// Tuning for the manager.
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    /// Per-subscription fan-out buffer. A handle that falls further
    /// behind than this observes a gap (logged, counted, never blocks
    /// the pump).
    pub fanout_capacity: usize,
    /// `optimize()` prunes subscriptions delivering fewer events per
    /// second than this.
    pub min_events_per_sec: f64,
    /// Grace period before a subscription is eligible for pruning.
    pub min_observation: Duration,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            fanout_capacity: 1024,
            min_events_per_sec: 0.0,
            min_observation: Duration::from_secs(30),
        }
    }
}

struct SubEntry {
    id: u64,
    state: SubscriptionState,
    refcount: usize,
    fanout: broadcast::Sender<Arc<Delivery>>,
    drain: Arc<Notify>,
    delivered: Arc<AtomicU64>,
    opened: Instant,
}

struct ManagerInner {
    channel: Arc<dyn Channel>,
    config: SubscriptionConfig,
    table: Mutex<HashMap<SubjectPattern, SubEntry>>,
    next_id: AtomicU64,
}

impl ManagerInner {
    fn release(&self, pattern: &SubjectPattern, id: u64) {
        let mut table = self.table.lock().expect("subscription table poisoned");
        let Some(entry) = table.get_mut(pattern) else {
            return;
        };
        if entry.id != id {
            // The pattern was reopened under a fresh subscription.
            return;
        }
        entry.refcount = entry.refcount.saturating_sub(1);
        if entry.refcount == 0 && entry.state == SubscriptionState::Active {
            entry.state = SubscriptionState::Draining;
            entry.drain.notify_one();
            debug!("subscription '{pattern}' draining (last handle released)");
        }
    }

    fn remove_closed(&self, pattern: &SubjectPattern, id: u64) {
        let mut table = self.table.lock().expect("subscription table poisoned");
        if table.get(pattern).is_some_and(|entry| entry.id == id) {
            table.remove(pattern);
            debug!("subscription '{pattern}' closed");
        }
    }
}

/// Owns the set of active subscriptions. Cheap to clone; all clones
/// share one table, and the table is the only thing mutated from
/// multiple tasks — every mutation goes through its single lock.
#[derive(Clone)]
pub struct SubscriptionManager {
    inner: Arc<ManagerInner>,
}

impl SubscriptionManager {
    /// Creates a manager over a channel.
    pub fn new(channel: Arc<dyn Channel>, config: SubscriptionConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                channel,
                config,
                table: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribes to a pattern.
    ///
    /// An existing live subscription for an equal pattern is shared:
    /// the refcount goes up and the returned handle taps the same
    /// stream. Otherwise a transport subscription is opened. A draining
    /// entry is replaced by a fresh subscription.
    pub async fn subscribe(&self, pattern: &SubjectPattern) -> SyncResult<SubscriptionHandle> {
        // Fast path: share a live entry.
        if let Some(handle) = self.try_share(pattern) {
            return Ok(handle);
        }

        // Slow path: open the transport subscription outside the lock.
        let mut transport_sub = self.inner.channel.subscribe(pattern).await?;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (fanout, receiver) = broadcast::channel(self.inner.config.fanout_capacity);
        let drain = Arc::new(Notify::new());
        let delivered = Arc::new(AtomicU64::new(0));

        {
            let mut table = self
                .inner
                .table
                .lock()
                .expect("subscription table poisoned");
            // Someone else may have opened the pattern while we awaited.
            if let Some(entry) = table.get_mut(pattern) {
                if entry.state == SubscriptionState::Requested
                    || entry.state == SubscriptionState::Active
                {
                    entry.refcount += 1;
                    let receiver = entry.fanout.subscribe();
                    let handle =
                        SubscriptionHandle::new(self.inner.clone(), pattern.clone(), entry.id, receiver);
                    // Ours is redundant; dropping it prunes it broker-side.
                    drop(transport_sub);
                    return Ok(handle);
                }
                // Draining entry: supersede it.
                table.remove(pattern);
            }
            table.insert(
                pattern.clone(),
                SubEntry {
                    id,
                    state: SubscriptionState::Requested,
                    refcount: 1,
                    fanout: fanout.clone(),
                    drain: drain.clone(),
                    delivered: delivered.clone(),
                    opened: Instant::now(),
                },
            );
        }

        // Pump transport deliveries into the fan-out until drained or
        // the transport ends the stream.
        let inner = self.inner.clone();
        let pump_pattern = pattern.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = drain.notified() => break,
                    maybe = transport_sub.recv() => match maybe {
                        Some(delivery) => {
                            delivered.fetch_add(1, Ordering::Relaxed);
                            // Send fails only with zero receivers; the
                            // entry then drains via refcount anyway.
                            let _ = fanout.send(Arc::new(delivery));
                        }
                        None => break,
                    },
                }
            }
            drop(transport_sub);
            inner.remove_closed(&pump_pattern, id);
        });

        {
            let mut table = self
                .inner
                .table
                .lock()
                .expect("subscription table poisoned");
            if let Some(entry) = table.get_mut(pattern) {
                if entry.id == id {
                    entry.state = SubscriptionState::Active;
                }
            }
        }

        debug!("subscription '{pattern}' active");
        Ok(SubscriptionHandle::new(
            self.inner.clone(),
            pattern.clone(),
            id,
            receiver,
        ))
    }

    fn try_share(&self, pattern: &SubjectPattern) -> Option<SubscriptionHandle> {
        let mut table = self
            .inner
            .table
            .lock()
            .expect("subscription table poisoned");
        let entry = table.get_mut(pattern)?;
        if entry.state != SubscriptionState::Requested && entry.state != SubscriptionState::Active
        {
            return None;
        }
        entry.refcount += 1;
        Some(SubscriptionHandle::new(
            self.inner.clone(),
            pattern.clone(),
            entry.id,
            entry.fanout.subscribe(),
        ))
    }

    /// Releases a handle. Equivalent to dropping it: the refcount goes
    /// down, and at zero the subscription drains and closes.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        drop(handle);
    }

    /// Prunes active subscriptions whose delivery rate is below the
    /// configured threshold. Returns how many were drained. Pruned
    /// patterns reopen lazily on the next `subscribe`.
    pub fn optimize(&self) -> usize {
        let config = &self.inner.config;
        let mut table = self
            .inner
            .table
            .lock()
            .expect("subscription table poisoned");
        let mut pruned = 0;
        for (pattern, entry) in table.iter_mut() {
            if entry.state != SubscriptionState::Active {
                continue;
            }
            let elapsed = entry.opened.elapsed();
            if elapsed < config.min_observation {
                continue;
            }
            let rate = entry.delivered.load(Ordering::Relaxed) as f64
                / elapsed.as_secs_f64().max(f64::EPSILON);
            if rate < config.min_events_per_sec {
                entry.state = SubscriptionState::Draining;
                entry.drain.notify_one();
                pruned += 1;
                debug!("pruned idle subscription '{pattern}' ({rate:.3} events/sec)");
            }
        }
        pruned
    }

    /// The lifecycle state of a pattern's subscription. `Closed` once
    /// torn down (or never opened).
    #[must_use]
    pub fn state(&self, pattern: &SubjectPattern) -> SubscriptionState {
        self.inner
            .table
            .lock()
            .expect("subscription table poisoned")
            .get(pattern)
            .map_or(SubscriptionState::Closed, |entry| entry.state)
    }

    /// Current handle count for a pattern.
    #[must_use]
    pub fn refcount(&self, pattern: &SubjectPattern) -> usize {
        self.inner
            .table
            .lock()
            .expect("subscription table poisoned")
            .get(pattern)
            .map_or(0, |entry| entry.refcount)
    }

    /// Number of table entries not yet closed.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.inner
            .table
            .lock()
            .expect("subscription table poisoned")
            .len()
    }
}

/// A reference-counted handle onto a managed subscription.
///
/// Deliveries arrive in publish order for the underlying subscription.
/// Dropping the handle is the cancellation mechanism.
pub struct SubscriptionHandle {
    inner: Arc<ManagerInner>,
    pattern: SubjectPattern,
    id: u64,
    receiver: broadcast::Receiver<Arc<Delivery>>,
    gaps: u64,
}

impl SubscriptionHandle {
    fn new(
        inner: Arc<ManagerInner>,
        pattern: SubjectPattern,
        id: u64,
        receiver: broadcast::Receiver<Arc<Delivery>>,
    ) -> Self {
        Self {
            inner,
            pattern,
            id,
            receiver,
            gaps: 0,
        }
    }

    /// The pattern this handle subscribes to.
    #[must_use]
    pub fn pattern(&self) -> &SubjectPattern {
        &self.pattern
    }

    /// Receives the next delivery. `None` once the subscription has
    /// drained or closed.
    pub async fn recv(&mut self) -> Option<Arc<Delivery>> {
        loop {
            match self.receiver.recv().await {
                Ok(delivery) => return Some(delivery),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.gaps += n;
                    warn!("subscription '{}' dropped {n} deliveries (slow handle)", self.pattern);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Deliveries this handle missed by falling behind the fan-out
    /// buffer.
    #[must_use]
    pub fn gap_count(&self) -> u64 {
        self.gaps
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.inner.release(&self.pattern, self.id);
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("pattern", &self.pattern)
            .field("id", &self.id)
            .finish()
    }
}
