//! Worker configuration

use reminders_common::RelayError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Worker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Current cache generation identifier
    pub cache_name: String,

    /// Application type reported by `GET_VERSION`
    pub app_type: String,

    /// Root-relative paths cached at install time
    pub manifest: Vec<String>,

    /// Requests that are never cached
    pub bypass: BypassRules,

    /// Origin the client application is served from
    pub app_origin: Url,

    /// Where rotated push subscriptions are posted
    pub subscribe_endpoint: Url,

    /// Delay before messaging a freshly opened window, in milliseconds
    pub window_open_delay_ms: u64,

    /// Notification content used when a push carries none
    pub notification: NotificationDefaults,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BypassRules {
    /// Host substrings that mark the local real-time origin
    pub host_patterns: Vec<String>,

    /// Port of the local real-time service
    pub service_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationDefaults {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,

    /// Tag shared by every reminder so a new one replaces the last
    pub tag: String,

    /// Vibration on full platforms
    pub vibrate: Vec<u32>,

    /// Vibration on constrained platforms (3 elements)
    pub constrained_vibrate: Vec<u32>,

    /// `source` entry of the notification data
    pub source: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_name: "simple-reminders-v1".to_string(),
            app_type: "simple-reminders".to_string(),
            manifest: [
                "/",
                "/index.html",
                "/manifest.json",
                "/icon-192x192.png",
                "/icon-512x512.png",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            bypass: BypassRules::default(),
            app_origin: Url::parse("http://localhost:3000/").expect("static url"),
            subscribe_endpoint: Url::parse("http://localhost:3001/subscribe").expect("static url"),
            window_open_delay_ms: 1000,
            notification: NotificationDefaults::default(),
        }
    }
}

impl Default for BypassRules {
    fn default() -> Self {
        Self {
            host_patterns: vec!["192.168.".to_string()],
            service_port: 3001,
        }
    }
}

impl Default for NotificationDefaults {
    fn default() -> Self {
        Self {
            title: "Simple Reminders".to_string(),
            body: "You have a new reminder".to_string(),
            icon: "/icon-192x192.png".to_string(),
            badge: "/icon-192x192.png".to_string(),
            tag: "reminder-notification".to_string(),
            vibrate: vec![200, 100, 200, 100, 200],
            constrained_vibrate: vec![200, 100, 200],
            source: "push".to_string(),
        }
    }
}

impl BypassRules {
    /// Whether a URL targets the local real-time origin.
    pub fn matches(&self, url: &Url) -> bool {
        let host_match = url
            .host_str()
            .map(|host| self.host_patterns.iter().any(|p| host.contains(p.as_str())))
            .unwrap_or(false);
        host_match || url.port() == Some(self.service_port)
    }
}

impl WorkerConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, RelayError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RelayError::config_with_source("invalid worker config", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.cache_name.trim().is_empty() {
            return Err(RelayError::config("cache_name must not be empty"));
        }
        if self.app_type.trim().is_empty() {
            return Err(RelayError::config("app_type must not be empty"));
        }
        if let Some(path) = self.manifest.iter().find(|p| !p.starts_with('/')) {
            return Err(RelayError::config(format!(
                "manifest entry '{path}' is not root-relative"
            )));
        }
        if self.notification.constrained_vibrate.len() != 3 {
            return Err(RelayError::config(
                "constrained_vibrate must have exactly 3 elements",
            ));
        }
        Ok(())
    }

    pub fn window_open_delay(&self) -> Duration {
        Duration::from_millis(self.window_open_delay_ms)
    }

    /// Root of the client application.
    pub fn app_root(&self) -> Url {
        let mut root = self.app_origin.clone();
        root.set_path("/");
        root.set_query(None);
        root.set_fragment(None);
        root
    }

    /// Absolute URL of a manifest path.
    pub fn resolve(&self, path: &str) -> Result<Url, RelayError> {
        self.app_origin
            .join(path)
            .map_err(|e| RelayError::config_with_source(format!("bad manifest path {path}"), e))
    }
}
