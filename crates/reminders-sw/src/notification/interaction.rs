//! Notification click and close handling.

use serde_json::{Map, Value as JsonValue};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::WorkerConfig;
use crate::host::{ClientInfo, ClientQuery, ClientType, Clients, NotificationCenter};
use crate::relay::RelayedEvent;

/// Which part of the notification the user hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionAction {
    Open,
    Dismiss,
    /// A server-supplied action id; handled like `Open`.
    Other(String),
}

impl InteractionAction {
    /// Body clicks carry no action id and mean `open`.
    pub fn parse(action: Option<&str>) -> Self {
        match action.map(str::trim) {
            None | Some("") | Some("open") => InteractionAction::Open,
            Some("dismiss") => InteractionAction::Dismiss,
            Some(other) => InteractionAction::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            InteractionAction::Open => "open",
            InteractionAction::Dismiss => "dismiss",
            InteractionAction::Other(id) => id,
        }
    }
}

/// A click or close on a displayed notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationInteraction {
    pub action: Option<String>,
    pub tag: String,
    pub data: Map<String, JsonValue>,
}

/// What to do after the notification is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickPlan {
    /// Nothing more.
    Dismiss,
    /// Focus this window and relay to it.
    Focus { client_id: String },
    /// Open a window here, wait, then relay.
    OpenWindow { url: Url },
}

/// Pick the window to use for a click.
pub fn plan_click(action: &InteractionAction, clients: &[ClientInfo], app_root: &Url) -> ClickPlan {
    if *action == InteractionAction::Dismiss {
        return ClickPlan::Dismiss;
    }

    let origin = app_root.origin();
    clients
        .iter()
        .find(|c| c.client_type == ClientType::Window && c.focusable && c.url.origin() == origin)
        .map(|c| ClickPlan::Focus {
            client_id: c.id.clone(),
        })
        .unwrap_or_else(|| ClickPlan::OpenWindow {
            url: app_root.clone(),
        })
}

/// How a click ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionOutcome {
    Dismissed,
    Focused { client_id: String, relayed: bool },
    Opened { client_id: Option<String>, relayed: bool },
    Failed,
}

/// Routes notification interactions to client windows.
#[derive(Debug, Clone)]
pub struct InteractionRouter {
    app_root: Url,
    open_delay: Duration,
}

impl InteractionRouter {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            app_root: config.app_root(),
            open_delay: config.window_open_delay(),
        }
    }

    /// Close first, then focus or open. Nothing here propagates an error.
    pub async fn handle_click(
        &self,
        interaction: &NotificationInteraction,
        notifications: &dyn NotificationCenter,
        clients: &dyn Clients,
        timestamp: u64,
    ) -> InteractionOutcome {
        if let Err(err) = notifications.close(&interaction.tag).await {
            warn!(tag = %interaction.tag, error = %err, "Failed to close notification");
        }

        let action = InteractionAction::parse(interaction.action.as_deref());
        if action == InteractionAction::Dismiss {
            debug!("Notification dismissed");
            return InteractionOutcome::Dismissed;
        }

        let windows = match clients.match_all(ClientQuery::all_windows()).await {
            Ok(windows) => windows,
            Err(err) => {
                warn!(error = %err, "Failed to enumerate clients");
                return InteractionOutcome::Failed;
            }
        };

        let message = RelayedEvent::Clicked {
            action: action.as_str().to_string(),
            data: interaction.data.clone(),
            timestamp,
        }
        .to_message();

        match plan_click(&action, &windows, &self.app_root) {
            ClickPlan::Dismiss => InteractionOutcome::Dismissed,
            ClickPlan::Focus { client_id } => {
                if let Err(err) = clients.focus(&client_id).await {
                    warn!(client = %client_id, error = %err, "Failed to focus client");
                    return InteractionOutcome::Failed;
                }
                let relayed = relay(clients, &client_id, message).await;
                InteractionOutcome::Focused { client_id, relayed }
            }
            ClickPlan::OpenWindow { url } => {
                let opened = match clients.open_window(&url).await {
                    Ok(opened) => opened,
                    Err(err) => {
                        warn!(%url, error = %err, "Failed to open window");
                        return InteractionOutcome::Failed;
                    }
                };
                let Some(window) = opened else {
                    info!(%url, "Window opened without a handle, skipping relay");
                    return InteractionOutcome::Opened {
                        client_id: None,
                        relayed: false,
                    };
                };

                // The new page needs time to register its message listener.
                tokio::time::sleep(self.open_delay).await;
                let relayed = relay(clients, &window.id, message).await;
                InteractionOutcome::Opened {
                    client_id: Some(window.id),
                    relayed,
                }
            }
        }
    }

    pub fn handle_close(&self, interaction: &NotificationInteraction) {
        info!(tag = %interaction.tag, "Notification closed by user");
    }
}

async fn relay(clients: &dyn Clients, client_id: &str, message: JsonValue) -> bool {
    match clients.post_message(client_id, message).await {
        Ok(()) => true,
        Err(err) => {
            warn!(client = %client_id, error = %err, "Failed to relay click");
            false
        }
    }
}
