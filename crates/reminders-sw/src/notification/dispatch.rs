//! Display a notification and tell every open window about it.

use tracing::{debug, info, warn};

use super::NotificationDescriptor;
use crate::host::{ClientQuery, Clients, NotificationCenter};
use crate::relay::RelayedEvent;

/// Outcome of one dispatch. Failures are counted, never raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub displayed: bool,
    pub relayed: usize,
    pub failed_relays: usize,
}

/// Best-effort notification delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationDispatcher;

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self
    }

    pub async fn dispatch(
        &self,
        descriptor: &NotificationDescriptor,
        notifications: &dyn NotificationCenter,
        clients: &dyn Clients,
        timestamp: u64,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        if let Err(err) = notifications.show(descriptor).await {
            warn!(title = %descriptor.title, error = %err, "Failed to show notification");
            return report;
        }
        report.displayed = true;
        info!(title = %descriptor.title, tag = %descriptor.tag, "Notification shown");

        let windows = match clients.match_all(ClientQuery::all_windows()).await {
            Ok(windows) => windows,
            Err(err) => {
                warn!(error = %err, "Failed to enumerate clients");
                return report;
            }
        };

        let message = RelayedEvent::Shown {
            notification: descriptor.clone(),
            timestamp,
        }
        .to_message();

        for window in &windows {
            match clients.post_message(&window.id, message.clone()).await {
                Ok(()) => report.relayed += 1,
                Err(err) => {
                    warn!(client = %window.id, error = %err, "Failed to relay notification");
                    report.failed_relays += 1;
                }
            }
        }
        debug!(relayed = report.relayed, "Relayed notification to clients");

        report
    }
}
