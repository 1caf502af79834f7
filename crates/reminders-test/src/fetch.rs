//! # Fetch Flow Tests
//!
//! Bypass routing, cache-first hits and the offline fallback.

use reminders_sw::{
    CacheStore, FetchRequest, FetchResponse, PlatformHint, ReminderWorker, WorkerConfig, WorkerEvent,
};

use crate::{init_test_logging, TestHost};

fn setup() -> (TestHost, ReminderWorker) {
    init_test_logging();
    let host = TestHost::new();
    let worker = host
        .worker(WorkerConfig::default(), PlatformHint::Full)
        .unwrap();
    (host, worker)
}

async fn fetch(worker: &ReminderWorker, url: &str) -> FetchResponse {
    worker
        .run(WorkerEvent::Fetch(FetchRequest::parse(url).unwrap()))
        .await
        .unwrap()
        .expect("fetch events always produce a response")
}

/// Private-network hosts and the service port go straight to the network.
#[tokio::test]
async fn test_bypass_never_reads_or_writes_cache() {
    let (host, worker) = setup();
    let cache_name = worker.config().cache_name.clone();

    for url in [
        "http://192.168.1.20:8080/api/reminders",
        "http://localhost:3001/events",
    ] {
        // A stale copy in the cache must not be served.
        let request = FetchRequest::parse(url).unwrap();
        host.cache
            .put(&cache_name, &request, &FetchResponse::new(200, "stale"))
            .await
            .unwrap();
        host.network.respond(url, FetchResponse::new(200, "live"));

        let first = fetch(&worker, url).await;
        let second = fetch(&worker, url).await;

        assert_eq!(first.text(), "live");
        assert!(!first.from_cache);
        assert_eq!(first, second);
        assert_eq!(host.network.calls_to(url), 2);

        let kept = host.cache.match_request(&cache_name, &request).await.unwrap().unwrap();
        assert_eq!(kept.text(), "stale");
    }

    assert_eq!(host.cache.len(&cache_name).await, 2);
}

#[tokio::test]
async fn test_bypass_network_failure_is_a_network_error() {
    let (host, worker) = setup();
    host.network.fail("http://localhost:3001/events", "connection reset");

    let response = fetch(&worker, "http://localhost:3001/events").await;
    assert_eq!(response.status, 0);
    assert!(host.cache.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_second_request_is_served_from_cache() {
    let (host, worker) = setup();
    let url = "http://localhost:3000/static/js/main.js";
    host.network
        .respond(url, FetchResponse::new(200, "console.log(1)").with_header("Content-Type", "text/javascript"));

    let first = fetch(&worker, url).await;
    assert!(!first.from_cache);
    assert_eq!(host.network.calls_to(url), 1);

    let second = fetch(&worker, url).await;
    assert!(second.from_cache);
    assert_eq!(second.text(), "console.log(1)");
    assert_eq!(second.header("content-type"), Some("text/javascript"));
    assert_eq!(host.network.calls_to(url), 1);

    let keys = host
        .cache
        .entry_keys(&worker.config().cache_name)
        .await
        .unwrap();
    assert_eq!(keys, vec![url.to_string()]);
}

#[tokio::test]
async fn test_non_200_is_delivered_but_not_stored() {
    let (host, worker) = setup();
    let url = "http://localhost:3000/missing.png";
    host.network.respond(url, FetchResponse::new(404, "nope"));

    assert_eq!(fetch(&worker, url).await.status, 404);
    assert_eq!(fetch(&worker, url).await.status, 404);
    assert_eq!(host.network.calls_to(url), 2);
    assert_eq!(host.cache.len(&worker.config().cache_name).await, 0);
}

#[tokio::test]
async fn test_network_failure_synthesizes_408() {
    let (host, worker) = setup();
    let url = "http://localhost:3000/api/reminders";

    let response = fetch(&worker, url).await;

    assert_eq!(response.status, 408);
    assert_eq!(response.header("content-type"), Some("application/json"));
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["error"], "Network error");
    assert_eq!(body["message"], "Network error: connection refused");
    assert_eq!(host.network.calls_to(url), 1);
}

#[tokio::test]
async fn test_non_get_response_is_not_cached() {
    let (host, worker) = setup();
    let url = "http://localhost:3000/api/notes";
    host.network.respond(url, FetchResponse::new(200, "{}"));

    let request = FetchRequest::post_json(url::Url::parse(url).unwrap(), &serde_json::json!({}));
    let handled = worker.handle(WorkerEvent::Fetch(request)).await;
    let completion = handled.lifetime.completed().await;

    assert_eq!(handled.response.unwrap().status, 200);
    assert!(completion.is_ok());
    assert_eq!(host.cache.len(&worker.config().cache_name).await, 0);
}

#[tokio::test]
async fn test_post_is_not_answered_with_cached_get() {
    let (host, worker) = setup();
    let url = "http://localhost:3000/api/notes";
    host.network.respond(url, FetchResponse::new(200, "get-body"));

    let cached = fetch(&worker, url).await;
    assert!(!cached.from_cache);
    assert_eq!(host.cache.len(&worker.config().cache_name).await, 1);

    host.network.respond(url, FetchResponse::new(201, "post-body"));
    let request = FetchRequest::post_json(
        url::Url::parse(url).unwrap(),
        &serde_json::json!({ "text": "buy milk" }),
    );
    let handled = worker.handle(WorkerEvent::Fetch(request)).await;
    let response = handled.response.unwrap();

    assert!(!response.from_cache);
    assert_eq!(response.status, 201);
    assert_eq!(response.text(), "post-body");
    assert_eq!(host.network.calls_to(url), 2);
    assert!(host.network.calls()[1].is_method("POST"));
}
