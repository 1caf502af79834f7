//! Install / activate lifecycle and cache generation garbage collection.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::CacheStore;
use crate::config::WorkerConfig;
use crate::fetch::FetchRequest;
use crate::host::{Clients, Network};
use crate::SwError;

// ==================== State ====================

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Script evaluated, no install yet.
    #[default]
    Parsed,
    /// Install event running.
    Installing,
    /// Installed, waiting to activate.
    Installed,
    /// Activate event running.
    Activating,
    /// Active and controlling clients.
    Active,
    /// Install failed or replaced.
    Redundant,
}

impl LifecycleState {
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Parsed, Installing)
                | (Redundant, Installing)
                | (Installing, Installed)
                | (Installing, Redundant)
                | (Installed, Activating)
                | (Activating, Active)
                | (Activating, Redundant)
                | (Active, Redundant)
        )
    }
}

/// Shared lifecycle state of one worker instance.
#[derive(Debug, Default)]
pub struct LifecycleTracker {
    state: Mutex<LifecycleState>,
    skip_waiting: AtomicBool,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&self, next: LifecycleState) -> Result<LifecycleState, SwError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let previous = *state;
        if !previous.can_transition_to(next) {
            return Err(SwError::State(format!(
                "cannot move from {previous:?} to {next:?}"
            )));
        }
        *state = next;
        debug!(?previous, ?next, "Lifecycle transition");
        Ok(previous)
    }

    pub fn request_skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }
}

// ==================== Garbage Collection ====================

/// Every generation name except the current one.
pub fn stale_generations<'a>(names: &'a [String], current: &str) -> Vec<&'a str> {
    names
        .iter()
        .map(String::as_str)
        .filter(|name| *name != current)
        .collect()
}

/// Result of an activation.
#[derive(Debug, Default)]
pub struct ActivationReport {
    pub deleted: Vec<String>,
    pub failed: Vec<(String, SwError)>,
    pub claimed: bool,
}

// ==================== Manager ====================

/// Populates and collects cache generations.
#[derive(Debug, Clone)]
pub struct CacheLifecycle {
    cache_name: String,
    manifest: Vec<Url>,
}

impl CacheLifecycle {
    pub fn new(config: &WorkerConfig) -> Result<Self, SwError> {
        let manifest = config
            .manifest
            .iter()
            .map(|path| config.resolve(path).map_err(|e| SwError::Install(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            cache_name: config.cache_name.clone(),
            manifest,
        })
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn manifest(&self) -> &[Url] {
        &self.manifest
    }

    /// Fetch every manifest entry and write them as one batch. Any failed or
    /// non-2xx fetch fails the install and nothing is written.
    pub async fn install(
        &self,
        cache: &dyn CacheStore,
        network: &dyn Network,
    ) -> Result<usize, SwError> {
        cache.open(&self.cache_name).await?;

        let mut batch = Vec::with_capacity(self.manifest.len());
        for url in &self.manifest {
            let request = FetchRequest::get(url.clone());
            let response = network
                .fetch(&request)
                .await
                .map_err(|e| SwError::Install(format!("{url}: {e}")))?;
            if !response.is_success() {
                return Err(SwError::Install(format!(
                    "{url}: status {}",
                    response.status
                )));
            }
            batch.push((request, response));
        }

        let count = batch.len();
        cache
            .put_all(&self.cache_name, batch)
            .await
            .map_err(|e| SwError::Install(e.to_string()))?;
        info!(cache = %self.cache_name, count, "Shell cached");
        Ok(count)
    }

    /// Delete every stale generation, then claim clients. Deletions are
    /// independent of each other; claiming waits for all of them.
    pub async fn activate(&self, cache: &dyn CacheStore, clients: &dyn Clients) -> ActivationReport {
        let mut report = ActivationReport::default();

        match cache.keys().await {
            Ok(names) => {
                for name in stale_generations(&names, &self.cache_name) {
                    match cache.delete(name).await {
                        Ok(_) => {
                            info!(cache = name, "Deleted stale cache");
                            report.deleted.push(name.to_string());
                        }
                        Err(err) => {
                            warn!(cache = name, error = %err, "Failed to delete stale cache");
                            report.failed.push((name.to_string(), err));
                        }
                    }
                }
            }
            Err(err) => warn!(error = %err, "Failed to list caches"),
        }

        match clients.claim().await {
            Ok(()) => report.claimed = true,
            Err(err) => warn!(error = %err, "Failed to claim clients"),
        }

        report
    }
}
