//! # Push Flow Tests
//!
//! Payload normalization, platform adaptation and the shown relay.

use bytes::Bytes;
use reminders_sw::{NotificationDefaults, PlatformHint, WorkerConfig, WorkerEvent};

use crate::{init_test_logging, TestHost};

fn push(payload: Option<&'static str>) -> WorkerEvent {
    WorkerEvent::Push {
        payload: payload.map(|p| Bytes::from_static(p.as_bytes())),
    }
}

fn action_ids(descriptor: &reminders_sw::NotificationDescriptor) -> Vec<String> {
    descriptor
        .actions
        .iter()
        .flatten()
        .map(|a| a.action.clone())
        .collect()
}

#[tokio::test]
async fn test_no_payload_shows_defaults() {
    init_test_logging();
    let host = TestHost::new();
    let worker = host.worker(WorkerConfig::default(), PlatformHint::Full).unwrap();

    worker.run(push(None)).await.unwrap();

    let shown = host.notifications.shown();
    assert_eq!(shown.len(), 1);
    let defaults = NotificationDefaults::default();
    let descriptor = &shown[0];
    assert_eq!(descriptor.title, defaults.title);
    assert_eq!(descriptor.body, defaults.body);
    assert_eq!(descriptor.icon, defaults.icon);
    assert_eq!(descriptor.badge, defaults.badge);
    assert_eq!(descriptor.tag, defaults.tag);
    assert!(descriptor.require_interaction);
    assert_eq!(descriptor.vibrate, defaults.vibrate);
    assert_eq!(descriptor.data["url"], "/");
    assert_eq!(descriptor.data["source"], "push");
    assert_eq!(action_ids(descriptor), vec!["open", "dismiss"]);
}

#[tokio::test]
async fn test_structured_payload_keeps_interaction_pinned() {
    init_test_logging();
    let host = TestHost::new();
    let worker = host.worker(WorkerConfig::default(), PlatformHint::Full).unwrap();

    worker
        .run(push(Some(
            r#"{"title":"Take pills","body":"8am dose","requireInteraction":false,"data":{"reminderId":42}}"#,
        )))
        .await
        .unwrap();

    let descriptor = &host.notifications.shown()[0];
    assert_eq!(descriptor.title, "Take pills");
    assert_eq!(descriptor.body, "8am dose");
    assert!(descriptor.require_interaction);
    assert_eq!(descriptor.data["reminderId"], 42);
    assert_eq!(descriptor.data["url"], "/");
}

#[tokio::test]
async fn test_text_payload_becomes_body() {
    init_test_logging();
    let host = TestHost::new();
    let worker = host.worker(WorkerConfig::default(), PlatformHint::Full).unwrap();

    worker.run(push(Some("Call mom"))).await.unwrap();

    let defaults = NotificationDefaults::default();
    let descriptor = &host.notifications.shown()[0];
    assert_eq!(descriptor.body, "Call mom");
    assert_eq!(descriptor.title, defaults.title);
    assert_eq!(descriptor.icon, defaults.icon);
    assert_eq!(descriptor.badge, defaults.badge);
    assert_eq!(descriptor.tag, defaults.tag);
    assert!(descriptor.require_interaction);
    assert_eq!(descriptor.vibrate, defaults.vibrate);
    assert_eq!(action_ids(descriptor), vec!["open", "dismiss"]);
}

#[tokio::test]
async fn test_constrained_platform_drops_actions() {
    init_test_logging();
    let host = TestHost::new();
    let platform = PlatformHint::from_user_agent(
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Version/17.0 Mobile/15E148 Safari/604.1",
    );
    assert!(platform.is_constrained());
    let worker = host.worker(WorkerConfig::default(), platform).unwrap();

    worker
        .run(push(Some(r#"{"title":"Stretch","actions":[{"action":"snooze","title":"Snooze"}]}"#)))
        .await
        .unwrap();

    let descriptor = &host.notifications.shown()[0];
    assert_eq!(descriptor.title, "Stretch");
    assert!(descriptor.actions.is_none());
    assert_eq!(descriptor.vibrate.len(), 3);
}

#[tokio::test]
async fn test_full_platform_keeps_server_actions() {
    init_test_logging();
    let host = TestHost::new();
    let worker = host.worker(WorkerConfig::default(), PlatformHint::Full).unwrap();

    worker
        .run(push(Some(r#"{"actions":[{"action":"snooze","title":"Snooze"}]}"#)))
        .await
        .unwrap();

    assert_eq!(action_ids(&host.notifications.shown()[0]), vec!["snooze"]);
}

#[tokio::test]
async fn test_shown_event_is_relayed_to_every_window() {
    init_test_logging();
    let host = TestHost::new();
    host.clients
        .add_window("tab-1", "http://localhost:3000/")
        .add_window("tab-2", "http://localhost:3000/settings");
    let worker = host.worker(WorkerConfig::default(), PlatformHint::Full).unwrap();

    worker.run(push(Some(r#"{"title":"Water plants"}"#))).await.unwrap();

    let posted = host.clients.posted();
    assert_eq!(posted.len(), 2);
    for message in &posted {
        assert_eq!(message.kind(), Some("REMINDER_NOTIFICATION_SHOWN"));
        assert_eq!(message.message["notification"]["title"], "Water plants");
        assert!(message.message["timestamp"].as_u64().is_some());
    }
}

#[tokio::test]
async fn test_display_and_relay_failures_are_swallowed() {
    init_test_logging();
    let host = TestHost::new();
    host.clients
        .add_window("gone", "http://localhost:3000/")
        .add_window("alive", "http://localhost:3000/");
    host.clients.fail_posts_to("gone");
    let worker = host.worker(WorkerConfig::default(), PlatformHint::Full).unwrap();

    worker.run(push(None)).await.unwrap();
    let posted = host.clients.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].client_id, "alive");

    host.notifications.fail_show();
    worker.run(push(None)).await.unwrap();
    assert_eq!(host.notifications.shown().len(), 1);
    assert_eq!(host.clients.posted().len(), 1);
}
