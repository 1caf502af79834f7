//! # Reminders Service Worker
//!
//! Background agent for the Simple Reminders web client: keeps the
//! application shell available offline and relays server-pushed reminders
//! as notifications.
//!
//! ## Features
//!
//! - **Lifecycle**: install populates the shell cache, activate collects
//!   stale cache generations and claims clients
//! - **Fetch routing**: bypass for the local real-time origin, cache-first
//!   with network fallback for everything else
//! - **Push**: payload normalization, platform adaptation, display and relay
//! - **Interactions**: focus or open a client window on notification click
//! - **Control channel**: `SKIP_WAITING`, `GET_VERSION`, `SYNC_REMINDERS`
//!
//! ## Architecture
//!
//! ```text
//! ReminderWorker::handle(WorkerEvent)
//!     │
//!     ├── RequestRouter ──────── CacheStore / Network
//!     ├── CacheLifecycle ─────── CacheStore / Network / Clients
//!     ├── Normalizer → NotificationDispatcher ── NotificationCenter / Clients
//!     ├── InteractionRouter ──── NotificationCenter / Clients
//!     ├── plan_control ───────── WorkerScope / ReplyPort
//!     └── SubscriptionRotator ── PushManager / Network
//! ```
//!
//! Decision logic is pure; host services sit behind the traits in [`host`]
//! and asynchronous work is registered on an [`ExtendableEvent`].

use reminders_common::RelayError;
use thiserror::Error;

pub mod cache;
pub mod config;
pub mod control;
pub mod event;
pub mod fetch;
pub mod host;
pub mod lifecycle;
pub mod notification;
pub mod relay;
pub mod router;
pub mod subscription;
pub mod worker;

pub use cache::{CacheEntry, CacheStore, MemoryCacheStore};
pub use config::{BypassRules, NotificationDefaults, WorkerConfig};
pub use control::{plan_control, ControlAction, ControlMessage, ReplyPort, VersionReply};
pub use event::{EventCompletion, EventKind, ExtendableEvent, WorkerEvent};
pub use fetch::{FetchRequest, FetchResponse};
pub use host::{ClientInfo, ClientQuery, ClientType, Clients, Host, Network, NotificationCenter, PushManager, WorkerScope};
pub use lifecycle::{stale_generations, ActivationReport, CacheLifecycle, LifecycleState, LifecycleTracker};
pub use notification::{
    ClickPlan, DispatchReport, InteractionAction, InteractionOutcome, InteractionRouter,
    NotificationAction, NotificationDescriptor, NotificationDispatcher, NotificationInteraction,
    Normalizer, PlatformHint,
};
pub use relay::RelayedEvent;
pub use router::{resolve_network, NetworkOutcome, RequestRouter, Route, Routed};
pub use subscription::{PushSubscription, SubscriptionKeys, SubscriptionOptions, SubscriptionRotator};
pub use worker::{HandledEvent, ReminderWorker};

// ==================== Errors ====================

/// Errors that can occur in worker operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwError {
    #[error("Install failed: {0}")]
    Install(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("State error: {0}")]
    State(String),
}

impl From<SwError> for RelayError {
    fn from(err: SwError) -> Self {
        match err {
            SwError::Install(message) | SwError::Cache(message) => RelayError::cache(message),
            SwError::Network(message) => RelayError::network(message),
            SwError::Notification(message) => RelayError::notification(message),
            SwError::Client(message) => RelayError::client(message),
            SwError::Subscription(message) => RelayError::subscription(message),
            SwError::State(message) => RelayError::InvalidState(message),
        }
    }
}
