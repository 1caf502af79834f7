//! Events relayed from the worker to client windows.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::notification::NotificationDescriptor;

/// Message posted to a client window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayedEvent {
    #[serde(rename = "REMINDER_NOTIFICATION_SHOWN")]
    Shown {
        notification: NotificationDescriptor,
        timestamp: u64,
    },
    #[serde(rename = "REMINDER_NOTIFICATION_CLICKED")]
    Clicked {
        action: String,
        data: Map<String, JsonValue>,
        timestamp: u64,
    },
}

impl RelayedEvent {
    /// Wire name of the event.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayedEvent::Shown { .. } => "REMINDER_NOTIFICATION_SHOWN",
            RelayedEvent::Clicked { .. } => "REMINDER_NOTIFICATION_CLICKED",
        }
    }

    pub fn to_message(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

/// Milliseconds since the UNIX epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
