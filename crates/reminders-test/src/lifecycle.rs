//! # Lifecycle Flow Tests
//!
//! Install populates exactly one generation; activate collects the rest.

use reminders_sw::{
    CacheLifecycle, CacheStore, FetchRequest, FetchResponse, LifecycleState, PlatformHint,
    WorkerConfig, WorkerEvent,
};

use crate::{init_test_logging, TestHost};

#[tokio::test]
async fn test_install_caches_manifest_and_skips_waiting() {
    init_test_logging();
    let host = TestHost::new();
    let config = WorkerConfig::default();
    host.serve_manifest(&config).unwrap();
    let worker = host.worker(config.clone(), PlatformHint::Full).unwrap();

    worker.run(WorkerEvent::Install).await.unwrap();

    assert_eq!(worker.state(), LifecycleState::Installed);
    assert!(worker.skip_waiting_requested());
    assert_eq!(host.scope.skip_waiting_calls(), 1);

    let keys = host.cache.entry_keys(&config.cache_name).await.unwrap();
    assert_eq!(keys.len(), config.manifest.len());
    assert!(keys.contains(&"http://localhost:3000/index.html".to_string()));
    assert!(keys.contains(&"http://localhost:3000/".to_string()));
}

#[tokio::test]
async fn test_install_is_all_or_nothing() {
    init_test_logging();
    let host = TestHost::new();
    let config = WorkerConfig::default();
    host.serve_manifest(&config).unwrap();
    host.network.respond(
        "http://localhost:3000/icon-512x512.png",
        FetchResponse::new(404, "not found"),
    );
    let worker = host.worker(config.clone(), PlatformHint::Full).unwrap();

    let err = worker.run(WorkerEvent::Install).await.unwrap_err();

    assert_eq!(err.category(), "cache");
    assert!(err.to_string().contains("icon-512x512.png"));
    assert_eq!(worker.state(), LifecycleState::Redundant);
    assert_eq!(host.cache.len(&config.cache_name).await, 0);
    assert_eq!(host.scope.skip_waiting_calls(), 0);
}

#[tokio::test]
async fn test_install_network_failure_fails_install() {
    init_test_logging();
    let host = TestHost::new();
    let config = WorkerConfig::default();
    host.serve_manifest(&config).unwrap();
    host.network
        .fail("http://localhost:3000/manifest.json", "connection reset");
    let worker = host.worker(config.clone(), PlatformHint::Full).unwrap();

    assert!(worker.run(WorkerEvent::Install).await.is_err());
    assert_eq!(host.cache.len(&config.cache_name).await, 0);

    // A later attempt with a healthy network succeeds.
    host.serve_manifest(&config).unwrap();
    worker.run(WorkerEvent::Install).await.unwrap();
    assert_eq!(host.cache.len(&config.cache_name).await, config.manifest.len());
}

#[tokio::test]
async fn test_activation_leaves_one_generation() {
    init_test_logging();
    let host = TestHost::new();
    let config = WorkerConfig::default();

    let old = FetchRequest::parse("http://localhost:3000/index.html").unwrap();
    for name in ["simple-reminders-v0", "legacy-shell"] {
        host.cache
            .put(name, &old, &FetchResponse::new(200, "old shell"))
            .await
            .unwrap();
    }

    host.serve_manifest(&config).unwrap();
    let worker = host.worker(config.clone(), PlatformHint::Full).unwrap();
    worker.run(WorkerEvent::Install).await.unwrap();
    worker.run(WorkerEvent::Activate).await.unwrap();

    assert_eq!(worker.state(), LifecycleState::Active);
    assert_eq!(host.cache.keys().await.unwrap(), vec![config.cache_name.clone()]);
    assert_eq!(host.clients.claims(), 1);
}

#[tokio::test]
async fn test_activate_before_install_is_rejected() {
    init_test_logging();
    let host = TestHost::new();
    let worker = host
        .worker(WorkerConfig::default(), PlatformHint::Full)
        .unwrap();

    let err = worker.run(WorkerEvent::Activate).await.unwrap_err();

    assert_eq!(err.category(), "invalid_state");
    assert_eq!(worker.state(), LifecycleState::Parsed);
    assert_eq!(host.clients.claims(), 0);
}

#[tokio::test]
async fn test_new_generation_replaces_old_worker_cache() {
    init_test_logging();
    let host = TestHost::new();

    let v1 = WorkerConfig::default();
    host.serve_manifest(&v1).unwrap();
    let first = host.worker(v1.clone(), PlatformHint::Full).unwrap();
    first.run(WorkerEvent::Install).await.unwrap();
    first.run(WorkerEvent::Activate).await.unwrap();

    let v2 = WorkerConfig {
        cache_name: "simple-reminders-v2".to_string(),
        ..WorkerConfig::default()
    };
    let second = host.worker(v2.clone(), PlatformHint::Full).unwrap();
    second.run(WorkerEvent::Install).await.unwrap();
    assert_eq!(host.cache.keys().await.unwrap().len(), 2);

    second.run(WorkerEvent::Activate).await.unwrap();
    assert_eq!(host.cache.keys().await.unwrap(), vec!["simple-reminders-v2".to_string()]);
    assert_eq!(host.cache.len("simple-reminders-v2").await, v2.manifest.len());
}

async fn seed_generations(host: &TestHost, names: &[&str]) {
    let old = FetchRequest::parse("http://localhost:3000/index.html").unwrap();
    for name in names {
        host.cache
            .put(name, &old, &FetchResponse::new(200, "old shell"))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_failed_delete_does_not_stop_collection_or_claim() {
    init_test_logging();
    let host = TestHost::new();
    let config = WorkerConfig::default();
    seed_generations(
        &host,
        &[config.cache_name.as_str(), "simple-reminders-v0", "stuck", "legacy-shell"],
    )
    .await;
    host.cache.fail_delete("stuck");

    let lifecycle = CacheLifecycle::new(&config).unwrap();
    let report = lifecycle
        .activate(host.cache.as_ref(), host.clients.as_ref())
        .await;

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "stuck");
    let mut deleted = report.deleted.clone();
    deleted.sort();
    assert_eq!(deleted, vec!["legacy-shell".to_string(), "simple-reminders-v0".to_string()]);
    assert!(report.claimed);
    assert_eq!(host.clients.claims(), 1);

    let mut remaining = host.cache.keys().await.unwrap();
    remaining.sort();
    assert_eq!(remaining, vec![config.cache_name.clone(), "stuck".to_string()]);
}

#[tokio::test]
async fn test_activation_survives_failed_delete() {
    init_test_logging();
    let host = TestHost::new();
    let config = WorkerConfig::default();
    seed_generations(&host, &["simple-reminders-v0", "stuck"]).await;
    host.cache.fail_delete("stuck");

    host.serve_manifest(&config).unwrap();
    let worker = host.worker(config.clone(), PlatformHint::Full).unwrap();
    worker.run(WorkerEvent::Install).await.unwrap();
    worker.run(WorkerEvent::Activate).await.unwrap();

    assert_eq!(worker.state(), LifecycleState::Active);
    assert_eq!(host.clients.claims(), 1);
    assert!(!host.cache.has("simple-reminders-v0").await);
    assert!(host.cache.has("stuck").await);
    assert!(host.cache.has(&config.cache_name).await);
}

#[tokio::test]
async fn test_install_tolerates_skip_waiting_failure() {
    init_test_logging();
    let host = TestHost::new();
    let config = WorkerConfig::default();
    host.serve_manifest(&config).unwrap();
    host.scope.fail_skip_waiting();
    let worker = host.worker(config.clone(), PlatformHint::Full).unwrap();

    worker.run(WorkerEvent::Install).await.unwrap();

    assert_eq!(worker.state(), LifecycleState::Installed);
    assert!(worker.skip_waiting_requested());
    assert_eq!(host.scope.skip_waiting_calls(), 1);
    assert_eq!(host.cache.len(&config.cache_name).await, config.manifest.len());
}
