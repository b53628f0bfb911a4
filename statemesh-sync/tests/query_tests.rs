use serde_json::json;
use statemesh_channel::{Channel, ChannelConfig, MemoryBroker, Subject};
use statemesh_sync::{EntityRegistry, QueryConfig, QueryEngine, QueryError};
use statemesh_types::{ComponentRecord, EntityId, TypeTag};
use std::sync::Arc;
use std::time::Duration;

fn tag(s: &str) -> TypeTag {
    TypeTag::new(s).unwrap()
}

fn channel(broker: &MemoryBroker) -> Arc<dyn Channel> {
    Arc::new(broker.connect(&ChannelConfig::default()).unwrap())
}

fn engine(channel: Arc<dyn Channel>, timeout: Duration) -> QueryEngine {
    QueryEngine::new(channel, QueryConfig { timeout })
}

async fn publish_component(
    channel: &Arc<dyn Channel>,
    entity_id: EntityId,
    tag_name: &str,
) {
    let record = ComponentRecord::new(entity_id, tag(tag_name), json!({}));
    channel
        .publish(
            &Subject::entity(&entity_id),
            statemesh_channel::encode_payload(&record).unwrap(),
        )
        .await
        .unwrap();
}

/// Polls the registry through the channel until it reflects published
/// state.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

// ── Canonicalization ─────────────────────────────────────────────

#[test]
fn query_subject_is_order_independent() {
    let a = tag("position");
    let b = tag("velocity");
    assert_eq!(Subject::query([&a, &b]), Subject::query([&b, &a]));
}

// ── Round trips against the registry ─────────────────────────────

#[tokio::test]
async fn query_returns_matching_entities() {
    let broker = MemoryBroker::default();
    let registry_channel = channel(&broker);
    let registry = EntityRegistry::spawn(registry_channel).await.unwrap();

    let publisher = channel(&broker);
    let both = EntityId::new();
    let only_pos = EntityId::new();
    publish_component(&publisher, both, "position").await;
    publish_component(&publisher, both, "velocity").await;
    publish_component(&publisher, only_pos, "position").await;
    settle().await;

    let engine = engine(channel(&broker), Duration::from_secs(1));
    let matched = engine
        .query(&[tag("position"), tag("velocity")])
        .await
        .unwrap();
    assert_eq!(matched, vec![both]);

    // Tag order does not change the result.
    let swapped = engine
        .query(&[tag("velocity"), tag("position")])
        .await
        .unwrap();
    assert_eq!(swapped, vec![both]);

    registry.stop().await;
}

#[tokio::test]
async fn members_lists_single_tag() {
    let broker = MemoryBroker::default();
    let registry = EntityRegistry::spawn(channel(&broker)).await.unwrap();

    let publisher = channel(&broker);
    let a = EntityId::new();
    let b = EntityId::new();
    publish_component(&publisher, a, "position").await;
    publish_component(&publisher, b, "position").await;
    settle().await;

    let engine = engine(channel(&broker), Duration::from_secs(1));
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(engine.members(&tag("position")).await.unwrap(), expected);

    registry.stop().await;
}

#[tokio::test]
async fn query_does_not_mutate_state() {
    let broker = MemoryBroker::default();
    let registry = EntityRegistry::spawn(channel(&broker)).await.unwrap();

    let publisher = channel(&broker);
    let id = EntityId::new();
    publish_component(&publisher, id, "position").await;
    settle().await;

    let engine = engine(channel(&broker), Duration::from_secs(1));
    for _ in 0..3 {
        assert_eq!(engine.query(&[tag("position")]).await.unwrap(), vec![id]);
    }

    let store = registry.stop().await;
    assert_eq!(store.entity_count(), 1);
    assert_eq!(store.version(&id, &tag("position")), Some(0));
}

// ── Failure modes ────────────────────────────────────────────────

#[tokio::test]
async fn query_without_responder_times_out() {
    let broker = MemoryBroker::default();
    let engine = engine(channel(&broker), Duration::from_millis(50));

    let err = engine
        .query(&[tag("position"), tag("velocity")])
        .await
        .unwrap_err();
    assert_eq!(err, QueryError::Timeout);
}

#[tokio::test]
async fn query_with_no_tags_is_malformed() {
    let broker = MemoryBroker::default();
    let engine = engine(channel(&broker), Duration::from_millis(50));
    assert!(matches!(
        engine.query(&[]).await.unwrap_err(),
        QueryError::Malformed(_)
    ));
}

#[tokio::test]
async fn undecodable_reply_is_malformed() {
    let broker = MemoryBroker::default();
    let responder = channel(&broker);
    let mut sub = responder
        .subscribe(&statemesh_channel::SubjectPattern::new("query.>").unwrap())
        .await
        .unwrap();
    tokio::spawn(async move {
        let delivery = sub.recv().await.unwrap();
        responder
            .respond(delivery.reply.unwrap(), b"not json".to_vec())
            .await
            .unwrap();
    });

    let engine = engine(channel(&broker), Duration::from_secs(1));
    let err = engine.query(&[tag("position")]).await.unwrap_err();
    assert!(matches!(err, QueryError::Malformed(_)));
}
