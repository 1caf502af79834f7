//! # Control Flow Tests
//!
//! Client control messages and push subscription rotation.

use serde_json::{json, Value as JsonValue};

use reminders_sw::{FetchResponse, PlatformHint, ReplyPort, SubscriptionOptions, WorkerConfig, WorkerEvent};

use crate::{init_test_logging, TestHost};

fn message(data: JsonValue, reply: Option<ReplyPort>) -> WorkerEvent {
    WorkerEvent::Message { data, reply }
}

fn previous() -> SubscriptionOptions {
    SubscriptionOptions {
        user_visible_only: true,
        application_server_key: Some("BServerKey".to_string()),
    }
}

#[tokio::test]
async fn test_get_version_replies_with_generation() {
    init_test_logging();
    let host = TestHost::new();
    let config = WorkerConfig {
        cache_name: "simple-reminders-v7".to_string(),
        ..WorkerConfig::default()
    };
    let worker = host.worker(config, PlatformHint::Full).unwrap();

    let (port, reply) = ReplyPort::channel();
    worker
        .run(message(json!({ "type": "GET_VERSION" }), Some(port)))
        .await
        .unwrap();

    assert_eq!(
        reply.await.unwrap(),
        json!({ "version": "simple-reminders-v7", "type": "simple-reminders" })
    );
}

#[tokio::test]
async fn test_get_version_without_port_is_harmless() {
    init_test_logging();
    let host = TestHost::new();
    let worker = host.worker(WorkerConfig::default(), PlatformHint::Full).unwrap();

    worker
        .run(message(json!({ "type": "GET_VERSION" }), None))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_skip_waiting_promotes_worker() {
    init_test_logging();
    let host = TestHost::new();
    let worker = host.worker(WorkerConfig::default(), PlatformHint::Full).unwrap();
    assert!(!worker.skip_waiting_requested());

    worker
        .run(message(json!({ "type": "SKIP_WAITING" }), None))
        .await
        .unwrap();

    assert!(worker.skip_waiting_requested());
    assert_eq!(host.scope.skip_waiting_calls(), 1);
}

#[tokio::test]
async fn test_sync_and_unknown_messages_have_no_side_effects() {
    init_test_logging();
    let host = TestHost::new();
    let worker = host.worker(WorkerConfig::default(), PlatformHint::Full).unwrap();

    for data in [
        json!({ "type": "SYNC_REMINDERS" }),
        json!({ "type": "RELOAD" }),
        json!("SKIP_WAITING"),
        json!(null),
    ] {
        let (port, mut reply) = ReplyPort::channel();
        worker.run(message(data, Some(port))).await.unwrap();
        assert!(reply.try_recv().is_err());
    }

    assert_eq!(host.scope.skip_waiting_calls(), 0);
    assert_eq!(host.network.call_count(), 0);
}

#[tokio::test]
async fn test_subscription_rotation_posts_new_subscription() {
    init_test_logging();
    let host = TestHost::new();
    let config = WorkerConfig::default();
    let endpoint = config.subscribe_endpoint.clone();
    host.network
        .respond(endpoint.as_str(), FetchResponse::new(201, "{}"));
    let worker = host.worker(config, PlatformHint::Full).unwrap();

    worker
        .run(WorkerEvent::PushSubscriptionChange {
            previous: Some(previous()),
        })
        .await
        .unwrap();

    let requests = host.push.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].application_server_key.as_deref(), Some("BServerKey"));
    assert!(requests[0].user_visible_only);

    let calls = host.network.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].is_method("POST"));
    assert_eq!(calls[0].url, endpoint);
    let body: JsonValue = serde_json::from_slice(calls[0].body.as_deref().unwrap()).unwrap();
    assert_eq!(body["endpoint"], "https://push.example/rotated");
    assert_eq!(body["keys"]["p256dh"], "BNew");
}

#[tokio::test]
async fn test_subscription_rejection_is_reported() {
    init_test_logging();
    let host = TestHost::new();
    let config = WorkerConfig::default();
    host.network.respond(
        config.subscribe_endpoint.as_str(),
        FetchResponse::new(500, "boom"),
    );
    let worker = host.worker(config, PlatformHint::Full).unwrap();

    let err = worker
        .run(WorkerEvent::PushSubscriptionChange {
            previous: Some(previous()),
        })
        .await
        .unwrap_err();

    assert_eq!(err.category(), "subscription");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_rotation_failures_before_posting() {
    init_test_logging();
    let host = TestHost::new();
    let worker = host.worker(WorkerConfig::default(), PlatformHint::Full).unwrap();

    let err = worker
        .run(WorkerEvent::PushSubscriptionChange { previous: None })
        .await
        .unwrap_err();
    assert_eq!(err.category(), "subscription");

    host.push.refuse();
    let err = worker
        .run(WorkerEvent::PushSubscriptionChange {
            previous: Some(previous()),
        })
        .await
        .unwrap_err();
    assert_eq!(err.category(), "subscription");
    assert_eq!(host.network.call_count(), 0);
}
