//! Single-process statemesh deployment.
//!
//! Wires the in-process broker, the entity registry, a demo mutation
//! source, and the headless UI loop into one runnable stack. The
//! binary half parses arguments and runs it; the library half exposes
//! the wiring so tests can drive the same composition.

use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use statemesh_channel::{
    encode_payload, Channel, ChannelConfig, MemoryBroker, Subject, SubjectPattern,
};
use statemesh_sync::{
    ComponentCache, EntityRegistry, RegistryHandle, SubscriptionConfig, SubscriptionManager,
};
use statemesh_types::{Component, EntityId, TypeTag};
use statemesh_ui::{Message, MessageBridge, Model, RetryPolicy, Runtime, RuntimeConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Everything the shell needs to run.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Broker connection settings.
    pub channel: ChannelConfig,
    /// Entities the demo mutation source keeps updating.
    pub entities: usize,
    /// Pause between demo mutations.
    pub tick: Duration,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            entities: 4,
            tick: Duration::from_millis(500),
        }
    }
}

/// Demo position component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Demo velocity component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Velocity {
    pub dx: f64,
    pub dy: f64,
}

/// The demo component tags.
pub fn demo_tags() -> (TypeTag, TypeTag) {
    let position = TypeTag::new("position").expect("static tag");
    let velocity = TypeTag::new("velocity").expect("static tag");
    (position, velocity)
}

/// A running shell stack.
pub struct Shell {
    broker: MemoryBroker,
    registry: RegistryHandle,
    loop_task: JoinHandle<Model>,
    source_task: JoinHandle<()>,
    refresh_task: JoinHandle<()>,
}

impl Shell {
    /// Stands the whole stack up: broker, registry, bridge, mutation
    /// source, periodic refresh, and the update loop.
    pub async fn start(config: ShellConfig) -> Result<Self> {
        let broker = MemoryBroker::new(config.channel.auth_token.clone());
        let channel: Arc<dyn Channel> = Arc::new(
            broker
                .connect(&config.channel)
                .context("connecting UI channel")?,
        );

        let registry = EntityRegistry::spawn(channel.clone())
            .await
            .context("spawning entity registry")?;

        let (position, velocity) = demo_tags();
        let model = Model::new(vec![position, velocity]);
        let runtime = Runtime::new(channel.clone(), model, RuntimeConfig::default())
            .with_renderer(|view| {
                info!("view: {}", view.status);
                if let Some(diagnostic) = &view.diagnostic {
                    warn!("diagnostic: {diagnostic}");
                }
            });
        let inbox = runtime.inbox();

        let manager = SubscriptionManager::new(channel.clone(), SubscriptionConfig::default());
        let cache = Arc::new(Mutex::new(ComponentCache::new(256)));
        let bridge = MessageBridge::new(inbox.clone()).with_cache(cache);
        bridge.attach_resilient(
            manager,
            SubjectPattern::new("entity.>").expect("static pattern"),
            RetryPolicy::default(),
        );

        let source_channel: Arc<dyn Channel> = Arc::new(
            broker
                .connect(&config.channel)
                .context("connecting mutation source")?,
        );
        let source_task = tokio::spawn(mutation_source(
            source_channel,
            config.entities,
            config.tick,
        ));

        let refresh_inbox = inbox.clone();
        let refresh_tick = config.tick.max(Duration::from_millis(250));
        let refresh_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(refresh_tick * 4);
            loop {
                interval.tick().await;
                if refresh_inbox.send(Message::Refresh).is_err() {
                    return;
                }
            }
        });

        let loop_task = tokio::spawn(runtime.run());

        Ok(Self {
            broker,
            registry,
            loop_task,
            source_task,
            refresh_task,
        })
    }

    /// Tears the stack down and returns the loop's final model.
    pub async fn shutdown(self) -> Result<Model> {
        self.source_task.abort();
        self.refresh_task.abort();
        // Killing the broker ends every stream; the bridge spends its
        // retry budget and feeds the terminal disconnect.
        self.broker.shutdown();
        let model = self.loop_task.await.context("joining update loop")?;
        self.registry.stop().await;
        Ok(model)
    }
}

/// The demo domain mutation source: keeps a handful of entities moving
/// by publishing monotonically versioned position/velocity updates.
async fn mutation_source(channel: Arc<dyn Channel>, entities: usize, tick: Duration) {
    let (position_tag, velocity_tag) = demo_tags();
    let mut positions: Vec<Component<Position>> = (0..entities.max(1))
        .map(|_| {
            Component::new(
                EntityId::new(),
                position_tag.clone(),
                Position { x: 0.0, y: 0.0 },
            )
        })
        .collect();
    let mut velocities: Vec<Component<Velocity>> = positions
        .iter()
        .map(|p| Component::new(p.entity_id, velocity_tag.clone(), Velocity { dx: 1.0, dy: 1.0 }))
        .collect();

    // Announce initial state.
    for p in &positions {
        if publish_component(&channel, p).await.is_err() {
            return;
        }
    }
    for v in &velocities {
        if publish_component(&channel, v).await.is_err() {
            return;
        }
    }

    let mut index = 0usize;
    loop {
        tokio::time::sleep(tick).await;
        index = (index + 1) % positions.len();

        let jitter: f64 = rand::thread_rng().gen_range(-0.5..0.5);
        let velocity = &velocities[index];
        let position = &positions[index];
        let next_velocity = velocity.next(Velocity {
            dx: velocity.data.dx + jitter,
            dy: velocity.data.dy - jitter,
        });
        let next_position = position.next(Position {
            x: position.data.x + next_velocity.data.dx,
            y: position.data.y + next_velocity.data.dy,
        });

        if publish_component(&channel, &next_position).await.is_err()
            || publish_component(&channel, &next_velocity).await.is_err()
        {
            debug!("mutation source stopping: channel gone");
            return;
        }
        velocities[index] = next_velocity;
        positions[index] = next_position;
    }
}

async fn publish_component<T: Serialize>(
    channel: &Arc<dyn Channel>,
    component: &Component<T>,
) -> Result<()> {
    let record = component.encode().context("encoding component")?;
    let payload = encode_payload(&record).context("encoding payload")?;
    channel
        .publish(&Subject::entity(&record.entity_id), payload)
        .await
        .context("publishing component")?;
    Ok(())
}
