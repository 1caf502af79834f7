//! Request routing: bypass vs cache-first with network fallback.

use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::config::{BypassRules, WorkerConfig};
use crate::fetch::{FetchRequest, FetchResponse};
use crate::host::Network;
use crate::SwError;

/// How a request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Straight to the network, never touches the cache.
    Bypass,
    /// Cache first, network on miss.
    Cacheable,
}

/// What to do with a network result for a cache miss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkOutcome {
    /// 200: deliver, and store a clone.
    Store(FetchResponse),
    /// Any other status: deliver as-is.
    PassThrough(FetchResponse),
    /// No response: deliver the synthesized 408.
    Offline(FetchResponse),
}

impl NetworkOutcome {
    pub fn response(&self) -> &FetchResponse {
        match self {
            NetworkOutcome::Store(r) | NetworkOutcome::PassThrough(r) | NetworkOutcome::Offline(r) => r,
        }
    }

    pub fn into_response(self) -> FetchResponse {
        match self {
            NetworkOutcome::Store(r) | NetworkOutcome::PassThrough(r) | NetworkOutcome::Offline(r) => r,
        }
    }
}

/// Decide what a network result means for the cache.
pub fn resolve_network(result: Result<FetchResponse, SwError>) -> NetworkOutcome {
    match result {
        Ok(response) if response.status == 200 => NetworkOutcome::Store(response),
        Ok(response) => NetworkOutcome::PassThrough(response),
        Err(err) => NetworkOutcome::Offline(FetchResponse::offline(&err.to_string())),
    }
}

/// A routed response plus the cache write it still owes.
#[derive(Debug, Clone)]
pub struct Routed {
    pub route: Route,
    pub response: FetchResponse,
    /// Clone to store under the request key, off the response path.
    pub write_back: Option<(FetchRequest, FetchResponse)>,
}

/// Classifies requests and serves them.
#[derive(Debug, Clone)]
pub struct RequestRouter {
    cache_name: String,
    bypass: BypassRules,
}

impl RequestRouter {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            cache_name: config.cache_name.clone(),
            bypass: config.bypass.clone(),
        }
    }

    /// Generation this router reads and writes.
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn classify(&self, request: &FetchRequest) -> Route {
        if self.bypass.matches(&request.url) {
            Route::Bypass
        } else {
            Route::Cacheable
        }
    }

    /// Serve one request. The cache write for a 200 miss is returned, not
    /// performed, so the caller can run it without delaying the response.
    pub async fn respond(
        &self,
        request: &FetchRequest,
        cache: &dyn CacheStore,
        network: &dyn Network,
    ) -> Routed {
        match self.classify(request) {
            Route::Bypass => {
                debug!(url = %request.url, "Bypassing cache");
                let response = match network.fetch(request).await {
                    Ok(response) => response,
                    Err(err) => {
                        warn!(url = %request.url, error = %err, "Bypass fetch failed");
                        FetchResponse::network_error()
                    }
                };
                Routed {
                    route: Route::Bypass,
                    response,
                    write_back: None,
                }
            }
            Route::Cacheable => self.cache_first(request, cache, network).await,
        }
    }

    async fn cache_first(
        &self,
        request: &FetchRequest,
        cache: &dyn CacheStore,
        network: &dyn Network,
    ) -> Routed {
        let lookup = if request.is_method("GET") {
            cache.match_request(&self.cache_name, request).await
        } else {
            Ok(None)
        };
        match lookup {
            Ok(Some(hit)) => {
                debug!(url = %request.url, "Cache hit");
                return Routed {
                    route: Route::Cacheable,
                    response: hit,
                    write_back: None,
                };
            }
            Ok(None) => {}
            Err(err) => warn!(url = %request.url, error = %err, "Cache lookup failed, treating as miss"),
        }

        let outcome = resolve_network(network.fetch(request).await);
        match outcome {
            NetworkOutcome::Store(response) => Routed {
                route: Route::Cacheable,
                write_back: Some((request.clone(), response.clone())),
                response,
            },
            NetworkOutcome::PassThrough(response) => {
                debug!(url = %request.url, status = response.status, "Not caching response");
                Routed {
                    route: Route::Cacheable,
                    response,
                    write_back: None,
                }
            }
            NetworkOutcome::Offline(response) => {
                warn!(url = %request.url, "Network unavailable, returning offline response");
                Routed {
                    route: Route::Cacheable,
                    response,
                    write_back: None,
                }
            }
        }
    }
}
