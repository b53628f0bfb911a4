use serde_json::json;
use statemesh_channel::{Channel, ChannelConfig, MemoryBroker, Subject, SubjectPattern};
use statemesh_sync::{
    EntityRegistry, QueryConfig, SubscriptionConfig, SubscriptionManager,
};
use statemesh_types::{ComponentRecord, EntityId, TypeTag};
use statemesh_ui::{
    ConnectionStatus, Message, MessageBridge, Model, RetryPolicy, Runtime, RuntimeConfig,
};
use std::sync::Arc;
use std::time::Duration;

fn tag(s: &str) -> TypeTag {
    TypeTag::new(s).unwrap()
}

fn channel(broker: &MemoryBroker) -> Arc<dyn Channel> {
    Arc::new(broker.connect(&ChannelConfig::default()).unwrap())
}

fn runtime(broker: &MemoryBroker, model: Model) -> Runtime {
    Runtime::new(
        channel(broker),
        model,
        RuntimeConfig {
            command_timeout: Duration::from_secs(1),
            query: QueryConfig {
                timeout: Duration::from_millis(200),
            },
        },
    )
}

/// Wires a resilient bridge from `entity.>` into the runtime's inbox.
fn attach_bridge(broker: &MemoryBroker, rt: &Runtime) {
    let manager = SubscriptionManager::new(channel(broker), SubscriptionConfig::default());
    let bridge = MessageBridge::new(rt.inbox());
    bridge.attach_resilient(
        manager,
        SubjectPattern::new("entity.>").unwrap(),
        RetryPolicy::default(),
    );
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn edit_round_trips_through_the_broker() {
    let broker = MemoryBroker::default();
    let registry = EntityRegistry::spawn(channel(&broker)).await.unwrap();

    let rt = runtime(&broker, Model::new(vec![tag("position")]));
    let inbox = rt.inbox();
    attach_bridge(&broker, &rt);
    settle().await;

    let loop_task = tokio::spawn(rt.run());

    let id = EntityId::new();
    inbox
        .send(Message::EditComponent {
            entity_id: id,
            type_tag: tag("position"),
            data: json!({"x": 1}),
        })
        .unwrap();
    settle().await;

    inbox.send(Message::Disconnected).unwrap();
    let model = loop_task.await.unwrap();

    // The edit was published, came back through the subscription, and
    // applied at version 0.
    assert_eq!(model.store.version(&id, &tag("position")), Some(0));
    // The registry saw the same publish.
    let store = registry.stop().await;
    assert_eq!(store.version(&id, &tag("position")), Some(0));
}

#[tokio::test]
async fn refresh_updates_matches_from_registry() {
    let broker = MemoryBroker::default();
    let registry = EntityRegistry::spawn(channel(&broker)).await.unwrap();

    // Seed domain state from a separate mutation source.
    let publisher = channel(&broker);
    let id = EntityId::new();
    let record = ComponentRecord::new(id, tag("position"), json!({}));
    publisher
        .publish(
            &Subject::entity(&id),
            statemesh_channel::encode_payload(&record).unwrap(),
        )
        .await
        .unwrap();
    settle().await;

    let rt = runtime(&broker, Model::new(vec![tag("position")]));
    let inbox = rt.inbox();
    let loop_task = tokio::spawn(rt.run());

    inbox.send(Message::Refresh).unwrap();
    settle().await;
    inbox.send(Message::Disconnected).unwrap();

    let model = loop_task.await.unwrap();
    assert_eq!(model.matches, vec![id]);
    assert_eq!(model.connection, ConnectionStatus::Disconnected);
    registry.stop().await;
}

#[tokio::test]
async fn query_without_responder_surfaces_timeout_diagnostic() {
    let broker = MemoryBroker::default();
    // No registry task: nothing answers queries.
    let rt = runtime(&broker, Model::new(vec![tag("position"), tag("velocity")]));
    let inbox = rt.inbox();
    let loop_task = tokio::spawn(rt.run());

    inbox.send(Message::Refresh).unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    inbox.send(Message::Disconnected).unwrap();

    let model = loop_task.await.unwrap();
    let diagnostic = model.last_diagnostic.unwrap();
    assert!(diagnostic.contains("timed out"), "got: {diagnostic}");
}

#[tokio::test]
async fn broker_loss_ends_in_terminal_disconnect() {
    let broker = MemoryBroker::default();
    let rt = runtime(&broker, Model::new(vec![tag("position")]));
    let inbox = rt.inbox();

    let manager = SubscriptionManager::new(channel(&broker), SubscriptionConfig::default());
    let bridge = MessageBridge::new(inbox);
    bridge.attach_resilient(
        manager,
        SubjectPattern::new("entity.>").unwrap(),
        RetryPolicy {
            budget: 1,
            backoff: Duration::from_millis(5),
        },
    );
    settle().await;

    let loop_task = tokio::spawn(rt.run());
    broker.shutdown();

    // The loop ends on its own with the terminal state; no external
    // Disconnected injection needed.
    let model = tokio::time::timeout(Duration::from_secs(2), loop_task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(model.connection, ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn renderer_sees_fresh_views() {
    let broker = MemoryBroker::default();
    let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();
    let rt = runtime(&broker, Model::new(vec![tag("position")])).with_renderer(move |view| {
        let _ = seen_tx.send(view.status.clone());
    });
    let inbox = rt.inbox();
    let loop_task = tokio::spawn(rt.run());

    inbox.send(Message::Select(EntityId::new())).unwrap();
    inbox.send(Message::Disconnected).unwrap();
    loop_task.await.unwrap();

    let first = seen_rx.recv().await.unwrap();
    assert!(first.starts_with("connected"));
    let last = seen_rx.recv().await.unwrap();
    assert_eq!(last, "disconnected");
}
