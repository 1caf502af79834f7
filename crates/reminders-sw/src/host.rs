//! Platform services the worker orchestrates.
//!
//! Everything the worker cannot do by itself (network, notification
//! display, client windows, push subscriptions) is reached through these
//! traits. A [`Host`] bundles one implementation of each.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use url::Url;

use crate::cache::CacheStore;
use crate::fetch::{FetchRequest, FetchResponse};
use crate::notification::NotificationDescriptor;
use crate::subscription::{PushSubscription, SubscriptionOptions};
use crate::SwError;

// ==================== Network ====================

#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request. `Err` means no response arrived at all.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, SwError>;
}

// ==================== Notifications ====================

#[async_trait]
pub trait NotificationCenter: Send + Sync {
    /// Display a notification.
    async fn show(&self, descriptor: &NotificationDescriptor) -> Result<(), SwError>;

    /// Close the displayed notification with this tag.
    async fn close(&self, tag: &str) -> Result<(), SwError>;
}

// ==================== Clients ====================

/// A client (open browsing context).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    /// Client ID.
    pub id: String,

    /// Client URL.
    pub url: Url,

    /// Client type.
    pub client_type: ClientType,

    /// Whether the host can focus this client.
    pub focusable: bool,

    /// Whether this worker controls the client.
    pub controlled: bool,
}

/// Client type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientType {
    #[default]
    Window,
    Worker,
    SharedWorker,
    All,
}

/// Options for `match_all`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientQuery {
    pub include_uncontrolled: bool,
    pub client_type: ClientType,
}

impl ClientQuery {
    /// Every window, controlled or not.
    pub fn all_windows() -> Self {
        Self {
            include_uncontrolled: true,
            client_type: ClientType::Window,
        }
    }

    /// Check a client against the query.
    pub fn accepts(&self, client: &ClientInfo) -> bool {
        let type_ok = match self.client_type {
            ClientType::All => true,
            t => client.client_type == t,
        };
        type_ok && (self.include_uncontrolled || client.controlled)
    }
}

/// Clients API.
#[async_trait]
pub trait Clients: Send + Sync {
    /// Snapshot of the clients matching the query.
    async fn match_all(&self, query: ClientQuery) -> Result<Vec<ClientInfo>, SwError>;

    /// Focus a window client.
    async fn focus(&self, id: &str) -> Result<ClientInfo, SwError>;

    /// Open a window. `None` when the host gives no handle back.
    async fn open_window(&self, url: &Url) -> Result<Option<ClientInfo>, SwError>;

    /// Post a structured message to a client.
    async fn post_message(&self, id: &str, message: JsonValue) -> Result<(), SwError>;

    /// Take control of every open uncontrolled client.
    async fn claim(&self) -> Result<(), SwError>;
}

// ==================== Scope / Push ====================

/// The worker's own registration.
#[async_trait]
pub trait WorkerScope: Send + Sync {
    /// Promote this worker to active without waiting for clients to close.
    async fn skip_waiting(&self) -> Result<(), SwError>;
}

#[async_trait]
pub trait PushManager: Send + Sync {
    /// Create a new push subscription.
    async fn subscribe(&self, options: &SubscriptionOptions) -> Result<PushSubscription, SwError>;
}

// ==================== Host ====================

/// All platform services, shared by every event handler.
#[derive(Clone)]
pub struct Host {
    pub cache: Arc<dyn CacheStore>,
    pub network: Arc<dyn Network>,
    pub notifications: Arc<dyn NotificationCenter>,
    pub clients: Arc<dyn Clients>,
    pub scope: Arc<dyn WorkerScope>,
    pub push: Arc<dyn PushManager>,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}
