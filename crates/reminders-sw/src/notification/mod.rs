//! Push-to-notification pipeline.
//!
//! ```text
//! push payload ──► Normalizer ──► NotificationDescriptor
//!                                      │
//!                       NotificationDispatcher ──► show + REMINDER_NOTIFICATION_SHOWN
//!
//! click / close ──► InteractionRouter ──► focus | open window ──► REMINDER_NOTIFICATION_CLICKED
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

pub mod dispatch;
pub mod interaction;
pub mod normalize;

pub use dispatch::{DispatchReport, NotificationDispatcher};
pub use interaction::{
    plan_click, ClickPlan, InteractionAction, InteractionOutcome, InteractionRouter,
    NotificationInteraction,
};
pub use normalize::Normalizer;

/// A button shown on the notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    /// Action id reported back on click.
    pub action: String,
    /// Button label.
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl NotificationAction {
    pub fn new(action: &str, title: &str, icon: Option<&str>) -> Self {
        Self {
            action: action.to_string(),
            title: title.to_string(),
            icon: icon.map(str::to_string),
        }
    }
}

/// Canonical notification, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDescriptor {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub require_interaction: bool,
    #[serde(alias = "vibrationPattern")]
    pub vibrate: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<NotificationAction>>,
    #[serde(default)]
    pub data: Map<String, JsonValue>,
}

/// What the client platform can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlatformHint {
    /// No action buttons, simple vibration (iOS / Safari family).
    Constrained,
    #[default]
    Full,
}

impl PlatformHint {
    /// Classify a user agent string.
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        let apple_mobile = ["iphone", "ipad", "ipod"].iter().any(|d| ua.contains(d));
        let desktop_safari = ua.contains("safari")
            && !ua.contains("chrome")
            && !ua.contains("chromium")
            && !ua.contains("android");
        if apple_mobile || desktop_safari {
            PlatformHint::Constrained
        } else {
            PlatformHint::Full
        }
    }

    pub fn is_constrained(self) -> bool {
        self == PlatformHint::Constrained
    }
}
