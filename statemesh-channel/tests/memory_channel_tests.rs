use statemesh_channel::{
    Channel, ChannelConfig, MemoryBroker, Subject, SubjectPattern, TransportError,
};
use statemesh_types::EntityId;
use std::time::Duration;

fn connect(broker: &MemoryBroker) -> statemesh_channel::MemoryChannel {
    broker.connect(&ChannelConfig::default()).unwrap()
}

fn subject(s: &str) -> Subject {
    Subject::new(s).unwrap()
}

fn pattern(s: &str) -> SubjectPattern {
    SubjectPattern::new(s).unwrap()
}

// ── Authentication gate ──────────────────────────────────────────

#[test]
fn connect_rejects_bad_token() {
    let broker = MemoryBroker::new("secret");
    let config = ChannelConfig {
        endpoint: "mem://local".into(),
        auth_token: "wrong".into(),
    };
    let err = broker.connect(&config).unwrap_err();
    assert!(matches!(err, TransportError::Unauthorized(_)));
}

#[test]
fn connect_accepts_matching_token() {
    let broker = MemoryBroker::new("secret");
    let config = ChannelConfig {
        endpoint: "mem://local".into(),
        auth_token: "secret".into(),
    };
    assert!(broker.connect(&config).is_ok());
}

// ── Publish/subscribe ────────────────────────────────────────────

#[tokio::test]
async fn delivers_to_matching_subscription() {
    let broker = MemoryBroker::default();
    let channel = connect(&broker);

    let mut sub = channel.subscribe(&pattern("entity.*")).await.unwrap();
    let id = EntityId::new();
    channel
        .publish(&Subject::entity(&id), b"payload".to_vec())
        .await
        .unwrap();

    let delivery = sub.recv().await.unwrap();
    assert_eq!(delivery.subject, Subject::entity(&id));
    assert_eq!(delivery.payload, b"payload");
    assert!(delivery.reply.is_none());
}

#[tokio::test]
async fn does_not_deliver_nonmatching() {
    let broker = MemoryBroker::default();
    let channel = connect(&broker);

    let mut sub = channel.subscribe(&pattern("registry.*")).await.unwrap();
    channel
        .publish(&subject("entity.abc"), b"x".to_vec())
        .await
        .unwrap();
    channel
        .publish(&subject("registry.position"), b"y".to_vec())
        .await
        .unwrap();

    let delivery = sub.recv().await.unwrap();
    assert_eq!(delivery.payload, b"y");
}

#[tokio::test]
async fn preserves_publish_order_per_subscription() {
    let broker = MemoryBroker::default();
    let channel = connect(&broker);

    let mut sub = channel.subscribe(&pattern("entity.>")).await.unwrap();
    for i in 0u8..10 {
        channel
            .publish(&subject("entity.abc"), vec![i])
            .await
            .unwrap();
    }
    for i in 0u8..10 {
        assert_eq!(sub.recv().await.unwrap().payload, vec![i]);
    }
}

#[tokio::test]
async fn overlapping_subscriptions_receive_independently() {
    let broker = MemoryBroker::default();
    let channel = connect(&broker);
    let id = EntityId::new();
    let entity_subject = Subject::entity(&id);

    let mut wide = channel.subscribe(&pattern("entity.*")).await.unwrap();
    let mut narrow = channel
        .subscribe(&SubjectPattern::new(entity_subject.as_str()).unwrap())
        .await
        .unwrap();

    channel
        .publish(&entity_subject, b"first".to_vec())
        .await
        .unwrap();
    assert_eq!(wide.recv().await.unwrap().payload, b"first");
    assert_eq!(narrow.recv().await.unwrap().payload, b"first");

    // Dropping one handle does not affect delivery to the other.
    drop(narrow);
    channel
        .publish(&entity_subject, b"second".to_vec())
        .await
        .unwrap();
    assert_eq!(wide.recv().await.unwrap().payload, b"second");
}

#[tokio::test]
async fn dropped_subscription_is_pruned() {
    let broker = MemoryBroker::default();
    let channel = connect(&broker);

    let sub = channel.subscribe(&pattern("entity.*")).await.unwrap();
    assert_eq!(broker.subscription_count(), 1);
    drop(sub);
    assert_eq!(broker.subscription_count(), 0);
}

// ── Request/reply ────────────────────────────────────────────────

#[tokio::test]
async fn request_reply_round_trip() {
    let broker = MemoryBroker::default();
    let channel = connect(&broker);
    let responder = connect(&broker);

    let mut sub = responder.subscribe(&pattern("query.>")).await.unwrap();
    let server = tokio::spawn(async move {
        let delivery = sub.recv().await.unwrap();
        assert_eq!(delivery.payload, b"ask");
        responder
            .respond(delivery.reply.unwrap(), b"answer".to_vec())
            .await
            .unwrap();
    });

    let reply = channel
        .request(
            &subject("query.position"),
            b"ask".to_vec(),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
    assert_eq!(reply, b"answer");
    server.await.unwrap();
}

#[tokio::test]
async fn request_without_responder_times_out() {
    let broker = MemoryBroker::default();
    let channel = connect(&broker);

    let err = channel
        .request(
            &subject("query.position.velocity"),
            b"ask".to_vec(),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Timeout));
}

#[tokio::test]
async fn first_reply_wins_and_late_reply_is_discarded() {
    let broker = MemoryBroker::default();
    let channel = connect(&broker);

    let mut servers = Vec::new();
    for name in [b"one".to_vec(), b"two".to_vec()] {
        let responder = connect(&broker);
        let mut sub = responder.subscribe(&pattern("query.>")).await.unwrap();
        servers.push(tokio::spawn(async move {
            let delivery = sub.recv().await.unwrap();
            // Late replies must be discarded, not error.
            responder.respond(delivery.reply.unwrap(), name).await.unwrap();
        }));
    }

    let reply = channel
        .request(&subject("query.a"), vec![], Duration::from_secs(1))
        .await
        .unwrap();
    assert!(reply == b"one" || reply == b"two");
    for server in servers {
        server.await.unwrap();
    }
}

// ── Close semantics ──────────────────────────────────────────────

#[tokio::test]
async fn closed_channel_fails_operations() {
    let broker = MemoryBroker::default();
    let channel = connect(&broker);
    channel.close();

    let err = channel
        .publish(&subject("entity.abc"), vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::ChannelClosed));
    assert!(channel.subscribe(&pattern("entity.*")).await.is_err());
}

#[tokio::test]
async fn broker_shutdown_surfaces_connection_lost() {
    let broker = MemoryBroker::default();
    let channel = connect(&broker);
    let mut sub = channel.subscribe(&pattern("entity.*")).await.unwrap();

    broker.shutdown();

    // The stream ends…
    assert!(sub.recv().await.is_none());
    // …and the next operation reports the loss.
    let err = channel
        .publish(&subject("entity.abc"), vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::ConnectionLost(_)));
}
