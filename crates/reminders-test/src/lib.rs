//! # Reminders Test
//!
//! Host doubles and end-to-end event flow tests for the reminders worker.
//!
//! ## Test Types
//!
//! 1. **Fetch flows**: bypass routing, cache-first hits, offline fallback
//! 2. **Lifecycle flows**: install batches, activation garbage collection
//! 3. **Push flows**: normalization, platform adaptation, relay
//! 4. **Interaction flows**: dismiss, focus, open-then-relay
//! 5. **Control flows**: control messages and subscription rotation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reminders_test::TestHost;
//!
//! let host = TestHost::new();
//! host.serve_manifest(&config);
//! let worker = host.worker(config, PlatformHint::Full)?;
//! worker.run(WorkerEvent::Install).await?;
//! ```

use std::sync::Arc;

use reminders_common::RelayError;
use reminders_sw::{FetchResponse, Host, PlatformHint, ReminderWorker, WorkerConfig};
use tracing::debug;

pub mod doubles;

#[cfg(test)]
mod control;
#[cfg(test)]
mod fetch;
#[cfg(test)]
mod lifecycle;
#[cfg(test)]
mod push;

pub use doubles::{FakeCache, FakeClients, FakeNetwork, FakePush, FakeScope, PostedMessage, RecordingNotifications};

/// One of each host double, kept typed so tests can inspect them.
#[derive(Debug, Clone, Default)]
pub struct TestHost {
    pub cache: Arc<FakeCache>,
    pub network: Arc<FakeNetwork>,
    pub notifications: Arc<RecordingNotifications>,
    pub clients: Arc<FakeClients>,
    pub scope: Arc<FakeScope>,
    pub push: Arc<FakePush>,
}

impl TestHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Type-erased view handed to the worker.
    pub fn host(&self) -> Host {
        Host {
            cache: self.cache.clone(),
            network: self.network.clone(),
            notifications: self.notifications.clone(),
            clients: self.clients.clone(),
            scope: self.scope.clone(),
            push: self.push.clone(),
        }
    }

    pub fn worker(&self, config: WorkerConfig, platform: PlatformHint) -> Result<ReminderWorker, RelayError> {
        ReminderWorker::new(config, self.host(), platform)
    }

    /// Script a 200 for every manifest entry.
    pub fn serve_manifest(&self, config: &WorkerConfig) -> Result<(), RelayError> {
        for path in &config.manifest {
            let url = config.resolve(path)?;
            debug!(%url, "Serving manifest entry");
            self.network
                .respond(url.as_str(), FetchResponse::new(200, format!("asset {path}")));
        }
        Ok(())
    }
}

/// Route worker logs to the test output. Safe to call from every test.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = reminders_common::init_logging(
        reminders_common::LogConfig::test().with_filter("warn,reminders_sw=trace,reminders_test=debug"),
    );
}
