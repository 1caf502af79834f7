//! Scripted stand-ins for the host services.
//!
//! Every double records what the worker asked of it so flows can be
//! asserted on afterwards.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;
use url::Url;

use reminders_sw::{
    CacheStore, ClientInfo, ClientQuery, ClientType, Clients, FetchRequest, FetchResponse,
    MemoryCacheStore, Network,
    NotificationCenter, NotificationDescriptor, PushManager, PushSubscription, SubscriptionKeys,
    SubscriptionOptions, SwError, WorkerScope,
};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Normalizes a URL string the way [`Url`] serializes it.
fn url_key(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

// ==================== Cache ====================

/// In-memory cache store whose deletes can be made to fail per generation.
#[derive(Debug, Default)]
pub struct FakeCache {
    store: MemoryCacheStore,
    failing_deletes: Mutex<HashSet<String>>,
}

impl FakeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delete of `name` fail, leaving the generation in place.
    pub fn fail_delete(&self, name: &str) -> &Self {
        lock(&self.failing_deletes).insert(name.to_string());
        self
    }

    pub async fn has(&self, name: &str) -> bool {
        self.store.has(name).await
    }

    pub async fn len(&self, name: &str) -> usize {
        self.store.len(name).await
    }
}

#[async_trait]
impl CacheStore for FakeCache {
    async fn open(&self, name: &str) -> Result<(), SwError> {
        self.store.open(name).await
    }

    async fn match_request(
        &self,
        name: &str,
        request: &FetchRequest,
    ) -> Result<Option<FetchResponse>, SwError> {
        self.store.match_request(name, request).await
    }

    async fn put(
        &self,
        name: &str,
        request: &FetchRequest,
        response: &FetchResponse,
    ) -> Result<(), SwError> {
        self.store.put(name, request, response).await
    }

    async fn put_all(
        &self,
        name: &str,
        entries: Vec<(FetchRequest, FetchResponse)>,
    ) -> Result<(), SwError> {
        self.store.put_all(name, entries).await
    }

    async fn delete(&self, name: &str) -> Result<bool, SwError> {
        if lock(&self.failing_deletes).contains(name) {
            trace!(name, "Scripted delete failure");
            return Err(SwError::Cache(format!("Failed to delete '{name}'")));
        }
        self.store.delete(name).await
    }

    async fn keys(&self) -> Result<Vec<String>, SwError> {
        self.store.keys().await
    }

    async fn entry_keys(&self, name: &str) -> Result<Vec<String>, SwError> {
        self.store.entry_keys(name).await
    }
}

// ==================== Network ====================

#[derive(Debug, Clone)]
enum Scripted {
    Respond(FetchResponse),
    Fail(String),
}

/// Network that answers from a script keyed by URL. Unscripted URLs fail
/// as if the connection was refused.
#[derive(Debug, Default)]
pub struct FakeNetwork {
    script: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<FetchRequest>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: FetchResponse) -> &Self {
        lock(&self.script).insert(url_key(url), Scripted::Respond(response));
        self
    }

    pub fn fail(&self, url: &str, message: &str) -> &Self {
        lock(&self.script).insert(url_key(url), Scripted::Fail(message.to_string()));
        self
    }

    /// Every request seen, in order.
    pub fn calls(&self) -> Vec<FetchRequest> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        let key = url_key(url);
        lock(&self.calls)
            .iter()
            .filter(|r| r.url.as_str() == key)
            .count()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, SwError> {
        lock(&self.calls).push(request.clone());
        let scripted = lock(&self.script).get(request.url.as_str()).cloned();
        trace!(url = %request.url, scripted = scripted.is_some(), "Fake fetch");
        match scripted {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(SwError::Network(message)),
            None => Err(SwError::Network("connection refused".to_string())),
        }
    }
}

// ==================== Notifications ====================

/// Records shown and closed notifications.
#[derive(Debug, Default)]
pub struct RecordingNotifications {
    shown: Mutex<Vec<NotificationDescriptor>>,
    closed: Mutex<Vec<String>>,
    fail_show: AtomicBool,
    fail_close: AtomicBool,
}

impl RecordingNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `show` call fail.
    pub fn fail_show(&self) {
        self.fail_show.store(true, Ordering::SeqCst);
    }

    /// Make every `close` call fail.
    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    pub fn shown(&self) -> Vec<NotificationDescriptor> {
        lock(&self.shown).clone()
    }

    pub fn closed(&self) -> Vec<String> {
        lock(&self.closed).clone()
    }
}

#[async_trait]
impl NotificationCenter for RecordingNotifications {
    async fn show(&self, descriptor: &NotificationDescriptor) -> Result<(), SwError> {
        if self.fail_show.load(Ordering::SeqCst) {
            return Err(SwError::Notification("permission denied".to_string()));
        }
        lock(&self.shown).push(descriptor.clone());
        Ok(())
    }

    async fn close(&self, tag: &str) -> Result<(), SwError> {
        lock(&self.closed).push(tag.to_string());
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(SwError::Notification(format!("no notification tagged {tag}")));
        }
        Ok(())
    }
}

// ==================== Clients ====================

/// A message posted to a client, with the (possibly paused) clock time.
#[derive(Debug, Clone)]
pub struct PostedMessage {
    pub client_id: String,
    pub message: JsonValue,
    pub at: Instant,
}

impl PostedMessage {
    pub fn kind(&self) -> Option<&str> {
        self.message.get("type").and_then(JsonValue::as_str)
    }
}

/// Client windows the worker can see, focus, open and post to.
#[derive(Debug)]
pub struct FakeClients {
    windows: Mutex<Vec<ClientInfo>>,
    focused: Mutex<Vec<String>>,
    opened: Mutex<Vec<(Url, Instant)>>,
    posted: Mutex<Vec<PostedMessage>>,
    failing_posts: Mutex<HashSet<String>>,
    open_returns_handle: AtomicBool,
    claims: AtomicUsize,
    next_id: AtomicUsize,
}

impl Default for FakeClients {
    fn default() -> Self {
        Self {
            windows: Mutex::default(),
            focused: Mutex::default(),
            opened: Mutex::default(),
            posted: Mutex::default(),
            failing_posts: Mutex::default(),
            open_returns_handle: AtomicBool::new(true),
            claims: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
        }
    }
}

impl FakeClients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an open, focusable, controlled window.
    pub fn add_window(&self, id: &str, url: &str) -> &Self {
        self.add_client(ClientInfo {
            id: id.to_string(),
            url: Url::parse(url).expect("valid window url"),
            client_type: ClientType::Window,
            focusable: true,
            controlled: true,
        })
    }

    pub fn add_client(&self, client: ClientInfo) -> &Self {
        lock(&self.windows).push(client);
        self
    }

    /// `open_window` succeeds but hands back no client.
    pub fn open_without_handle(&self) {
        self.open_returns_handle.store(false, Ordering::SeqCst);
    }

    /// Posting to this client fails.
    pub fn fail_posts_to(&self, id: &str) {
        lock(&self.failing_posts).insert(id.to_string());
    }

    pub fn focused(&self) -> Vec<String> {
        lock(&self.focused).clone()
    }

    pub fn opened(&self) -> Vec<(Url, Instant)> {
        lock(&self.opened).clone()
    }

    pub fn posted(&self) -> Vec<PostedMessage> {
        lock(&self.posted).clone()
    }

    pub fn claims(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Clients for FakeClients {
    async fn match_all(&self, query: ClientQuery) -> Result<Vec<ClientInfo>, SwError> {
        Ok(lock(&self.windows)
            .iter()
            .filter(|c| query.accepts(c))
            .cloned()
            .collect())
    }

    async fn focus(&self, id: &str) -> Result<ClientInfo, SwError> {
        let client = lock(&self.windows)
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| SwError::Client(format!("no client {id}")))?;
        lock(&self.focused).push(id.to_string());
        Ok(client)
    }

    async fn open_window(&self, url: &Url) -> Result<Option<ClientInfo>, SwError> {
        lock(&self.opened).push((url.clone(), Instant::now()));
        if !self.open_returns_handle.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let id = format!("opened-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let client = ClientInfo {
            id,
            url: url.clone(),
            client_type: ClientType::Window,
            focusable: true,
            controlled: false,
        };
        lock(&self.windows).push(client.clone());
        Ok(Some(client))
    }

    async fn post_message(&self, id: &str, message: JsonValue) -> Result<(), SwError> {
        if lock(&self.failing_posts).contains(id) {
            return Err(SwError::Client(format!("client {id} is gone")));
        }
        lock(&self.posted).push(PostedMessage {
            client_id: id.to_string(),
            message,
            at: Instant::now(),
        });
        Ok(())
    }

    async fn claim(&self) -> Result<(), SwError> {
        self.claims.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ==================== Scope / Push ====================

/// Counts `skip_waiting` calls.
#[derive(Debug, Default)]
pub struct FakeScope {
    skip_waiting: AtomicUsize,
    refuse: AtomicBool,
}

impl FakeScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip_waiting_calls(&self) -> usize {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Make every later skip_waiting call fail after being counted.
    pub fn fail_skip_waiting(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl WorkerScope for FakeScope {
    async fn skip_waiting(&self) -> Result<(), SwError> {
        self.skip_waiting.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(SwError::State("skip_waiting refused".to_string()));
        }
        Ok(())
    }
}

/// Hands out a fixed subscription and records the options it was asked for.
#[derive(Debug)]
pub struct FakePush {
    subscription: Mutex<Option<PushSubscription>>,
    requests: Mutex<Vec<SubscriptionOptions>>,
}

impl Default for FakePush {
    fn default() -> Self {
        Self {
            subscription: Mutex::new(Some(PushSubscription {
                endpoint: "https://push.example/rotated".to_string(),
                expiration_time: None,
                keys: SubscriptionKeys {
                    p256dh: "BNew".to_string(),
                    auth: "auth-secret".to_string(),
                },
            })),
            requests: Mutex::default(),
        }
    }
}

impl FakePush {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `subscribe` fail.
    pub fn refuse(&self) {
        *lock(&self.subscription) = None;
    }

    pub fn requests(&self) -> Vec<SubscriptionOptions> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl PushManager for FakePush {
    async fn subscribe(&self, options: &SubscriptionOptions) -> Result<PushSubscription, SwError> {
        lock(&self.requests).push(options.clone());
        lock(&self.subscription)
            .clone()
            .ok_or_else(|| SwError::Subscription("push service unavailable".to_string()))
    }
}
