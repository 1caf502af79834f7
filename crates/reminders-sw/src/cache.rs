//! Cache store adapter.
//!
//! ```text
//! CacheStore (caches)
//!     └── generation "simple-reminders-v1"
//!             └── request key → CacheEntry
//! ```
//!
//! The worker only talks to [`CacheStore`]. [`MemoryCacheStore`] is the
//! in-process store used by default and in tests.

use async_trait::async_trait;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::fetch::{FetchRequest, FetchResponse};
use crate::SwError;

// ==================== Entries ====================

/// A cached request/response pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request URL.
    pub url: String,

    /// Request method.
    pub method: String,

    /// Response status.
    pub status: u16,

    /// Response status text.
    pub status_text: String,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Vec<u8>,

    /// Cached at timestamp (ms since epoch).
    pub cached_at: u64,
}

impl CacheEntry {
    /// Build an entry from a request and the response to store for it.
    pub fn new(request: &FetchRequest, response: &FetchResponse) -> Self {
        Self {
            url: request.cache_key().to_string(),
            method: request.method.to_ascii_uppercase(),
            status: response.status,
            status_text: response.status_text.clone(),
            headers: response.headers.clone(),
            body: response.body.to_vec(),
            cached_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default(),
        }
    }
}

// ==================== Store Trait ====================

/// Named, versioned request→response cache generations.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open a generation, creating it if it does not exist.
    async fn open(&self, name: &str) -> Result<(), SwError>;

    /// Exact-key lookup in one generation. Only GET requests can match.
    async fn match_request(
        &self,
        name: &str,
        request: &FetchRequest,
    ) -> Result<Option<FetchResponse>, SwError>;

    /// Store one response.
    async fn put(
        &self,
        name: &str,
        request: &FetchRequest,
        response: &FetchResponse,
    ) -> Result<(), SwError>;

    /// Store a batch of responses; either all are written or none are.
    async fn put_all(
        &self,
        name: &str,
        entries: Vec<(FetchRequest, FetchResponse)>,
    ) -> Result<(), SwError>;

    /// Delete a whole generation. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, SwError>;

    /// Names of all existing generations.
    async fn keys(&self) -> Result<Vec<String>, SwError>;

    /// Request keys stored in one generation.
    async fn entry_keys(&self, name: &str) -> Result<Vec<String>, SwError>;
}

// ==================== Cache ====================

/// One cache generation.
#[derive(Debug, Default)]
pub struct Cache {
    /// Cache name.
    pub name: String,

    /// Cached entries.
    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    /// Create a new cache.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Match a request key.
    pub fn match_request(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Add entry.
    pub fn put(&mut self, entry: CacheEntry) {
        self.entries.insert(entry.url.clone(), entry);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the generation holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get all keys (URLs).
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }
}

/// Only GET responses can be stored, as with the platform Cache API.
fn ensure_storable(request: &FetchRequest) -> Result<(), SwError> {
    if request.is_method("GET") {
        Ok(())
    } else {
        Err(SwError::Cache(format!(
            "Request method '{}' is unsupported",
            request.method
        )))
    }
}

// ==================== Memory Store ====================

/// In-memory [`CacheStore`].
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    caches: RwLock<HashMap<String, Cache>>,
}

impl MemoryCacheStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a generation exists.
    pub async fn has(&self, name: &str) -> bool {
        self.caches.read().await.contains_key(name)
    }

    /// Number of entries in a generation (0 if absent).
    pub async fn len(&self, name: &str) -> usize {
        self.caches
            .read()
            .await
            .get(name)
            .map(Cache::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn open(&self, name: &str) -> Result<(), SwError> {
        let mut caches = self.caches.write().await;
        caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name));
        Ok(())
    }

    async fn match_request(
        &self,
        name: &str,
        request: &FetchRequest,
    ) -> Result<Option<FetchResponse>, SwError> {
        if !request.is_method("GET") {
            return Ok(None);
        }
        let caches = self.caches.read().await;
        let hit = caches
            .get(name)
            .and_then(|cache| cache.match_request(request.cache_key()))
            .map(FetchResponse::from_cache);
        trace!(cache = name, key = request.cache_key(), hit = hit.is_some(), "Cache lookup");
        Ok(hit)
    }

    async fn put(
        &self,
        name: &str,
        request: &FetchRequest,
        response: &FetchResponse,
    ) -> Result<(), SwError> {
        ensure_storable(request)?;
        let entry = CacheEntry::new(request, response);
        let mut caches = self.caches.write().await;
        caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name))
            .put(entry);
        debug!(cache = name, key = request.cache_key(), "Stored response");
        Ok(())
    }

    async fn put_all(
        &self,
        name: &str,
        entries: Vec<(FetchRequest, FetchResponse)>,
    ) -> Result<(), SwError> {
        // Validate everything before touching the generation.
        let staged = entries
            .iter()
            .map(|(request, response)| {
                ensure_storable(request)?;
                Ok(CacheEntry::new(request, response))
            })
            .collect::<Result<Vec<_>, SwError>>()?;

        let mut caches = self.caches.write().await;
        let cache = caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name));
        let count = staged.len();
        for entry in staged {
            cache.put(entry);
        }
        debug!(cache = name, count, "Stored batch");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, SwError> {
        Ok(self.caches.write().await.remove(name).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>, SwError> {
        let mut names: Vec<String> = self.caches.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn entry_keys(&self, name: &str) -> Result<Vec<String>, SwError> {
        let caches = self.caches.read().await;
        let mut keys: Vec<String> = caches
            .get(name)
            .map(|cache| cache.keys().into_iter().map(str::to_string).collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }
}
