//! Control messages sent by client windows.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tokio::sync::oneshot;
use tracing::trace;

/// A `{type, ...payload}` message from a client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlMessage {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, JsonValue>,
}

impl ControlMessage {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: Some(kind.to_string()),
            payload: Map::new(),
        }
    }

    /// Anything that is not an object becomes an untyped message.
    pub fn from_value(value: JsonValue) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }
}

/// Something a control message asks the worker to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    SkipWaiting,
    ReplyVersion,
    SyncReminders,
}

/// Every entry is checked; all matches fire.
const CONTROL_TABLE: &[(&str, ControlAction)] = &[
    ("SKIP_WAITING", ControlAction::SkipWaiting),
    ("GET_VERSION", ControlAction::ReplyVersion),
    ("SYNC_REMINDERS", ControlAction::SyncReminders),
];

pub fn plan_control(message: &ControlMessage) -> Vec<ControlAction> {
    let Some(kind) = message.kind.as_deref() else {
        trace!("Control message without type");
        return Vec::new();
    };
    CONTROL_TABLE
        .iter()
        .filter(|(name, _)| *name == kind)
        .map(|(_, action)| *action)
        .collect()
}

/// Answer to `GET_VERSION`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReply {
    pub version: String,
    #[serde(rename = "type")]
    pub app_type: String,
}

/// Reply channel handed over with a message.
#[derive(Debug)]
pub struct ReplyPort(oneshot::Sender<JsonValue>);

impl ReplyPort {
    pub fn channel() -> (Self, oneshot::Receiver<JsonValue>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    /// Returns `false` if the client stopped listening.
    pub fn send(self, message: JsonValue) -> bool {
        self.0.send(message).is_ok()
    }
}
