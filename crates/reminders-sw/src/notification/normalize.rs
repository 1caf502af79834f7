//! Push payload normalization.
//!
//! Precedence, field by field:
//!
//! | field                | source                                  |
//! |----------------------|-----------------------------------------|
//! | title, body, icon, badge | payload string, else default        |
//! | actions              | payload array, else platform default    |
//! | data                 | defaults, payload keys override         |
//! | tag                  | always default                          |
//! | requireInteraction   | always `true`                           |
//! | vibrate              | always default for the platform         |
//!
//! A payload that is not a JSON object is used verbatim as `body`.

use serde_json::{json, Map, Value as JsonValue};
use tracing::{debug, trace};

use super::{NotificationAction, NotificationDescriptor, PlatformHint};
use crate::config::NotificationDefaults;

/// Parsed form of a push payload.
#[derive(Debug, Clone, PartialEq)]
enum Payload {
    Structured(Map<String, JsonValue>),
    Text(String),
}

fn parse_payload(raw: &[u8]) -> Option<Payload> {
    let text = String::from_utf8_lossy(raw);
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<JsonValue>(&text) {
        Ok(JsonValue::Object(map)) => Some(Payload::Structured(map)),
        Ok(_) | Err(_) => {
            trace!("Push payload is not a JSON object, using it as text");
            Some(Payload::Text(text.into_owned()))
        }
    }
}

/// Builds descriptors from push payloads.
#[derive(Debug, Clone)]
pub struct Normalizer {
    defaults: NotificationDefaults,
}

impl Normalizer {
    pub fn new(defaults: NotificationDefaults) -> Self {
        Self { defaults }
    }

    /// Descriptor used when nothing overrides the defaults.
    pub fn default_descriptor(&self, now_ms: u64) -> NotificationDescriptor {
        let mut data = Map::new();
        data.insert("url".to_string(), json!("/"));
        data.insert("timestamp".to_string(), json!(now_ms));
        data.insert("source".to_string(), json!(self.defaults.source));

        NotificationDescriptor {
            title: self.defaults.title.clone(),
            body: self.defaults.body.clone(),
            icon: self.defaults.icon.clone(),
            badge: self.defaults.badge.clone(),
            tag: self.defaults.tag.clone(),
            require_interaction: true,
            vibrate: self.defaults.vibrate.clone(),
            actions: None,
            data,
        }
    }

    /// Never fails: malformed input degrades to text or defaults.
    pub fn normalize(
        &self,
        payload: Option<&[u8]>,
        platform: PlatformHint,
        now_ms: u64,
    ) -> NotificationDescriptor {
        let mut descriptor = self.default_descriptor(now_ms);

        match payload.and_then(parse_payload) {
            Some(Payload::Structured(fields)) => self.merge(&mut descriptor, &fields),
            Some(Payload::Text(text)) => descriptor.body = text,
            None => {}
        }

        self.adapt(&mut descriptor, platform);
        debug!(title = %descriptor.title, ?platform, "Normalized push payload");
        descriptor
    }

    fn merge(&self, descriptor: &mut NotificationDescriptor, fields: &Map<String, JsonValue>) {
        let string = |key: &str| fields.get(key).and_then(JsonValue::as_str).map(str::to_string);

        if let Some(title) = string("title") {
            descriptor.title = title;
        }
        if let Some(body) = string("body") {
            descriptor.body = body;
        }
        if let Some(icon) = string("icon") {
            descriptor.icon = icon;
        }
        if let Some(badge) = string("badge") {
            descriptor.badge = badge;
        }
        if let Some(JsonValue::Array(items)) = fields.get("actions") {
            let actions: Vec<NotificationAction> = items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect();
            descriptor.actions = Some(actions);
        }
        if let Some(JsonValue::Object(data)) = fields.get("data") {
            for (key, value) in data {
                descriptor.data.insert(key.clone(), value.clone());
            }
        }

        // Pinned regardless of payload.
        descriptor.tag = self.defaults.tag.clone();
        descriptor.require_interaction = true;
        descriptor.vibrate = self.defaults.vibrate.clone();
    }

    fn adapt(&self, descriptor: &mut NotificationDescriptor, platform: PlatformHint) {
        match platform {
            PlatformHint::Constrained => {
                descriptor.actions = None;
                descriptor.vibrate = self.defaults.constrained_vibrate.clone();
            }
            PlatformHint::Full => {
                let missing = descriptor.actions.as_ref().map_or(true, Vec::is_empty);
                if missing {
                    descriptor.actions = Some(self.default_actions());
                }
            }
        }
    }

    fn default_actions(&self) -> Vec<NotificationAction> {
        vec![
            NotificationAction::new("open", "Open App", Some(self.defaults.icon.as_str())),
            NotificationAction::new("dismiss", "Dismiss", Some(self.defaults.badge.as_str())),
        ]
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(NotificationDefaults::default())
    }
}
