//! Push subscription rotation.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::fetch::FetchRequest;
use crate::host::{Network, PushManager};
use crate::SwError;

/// Keys of a push subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// A push subscription as posted to the origin server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub endpoint: String,
    #[serde(default)]
    pub expiration_time: Option<u64>,
    pub keys: SubscriptionKeys,
}

/// Options a subscription was created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionOptions {
    pub user_visible_only: bool,
    /// Base64url server key.
    pub application_server_key: Option<String>,
}

/// Re-subscribes and reports the new subscription to the server.
#[derive(Debug, Clone)]
pub struct SubscriptionRotator {
    endpoint: Url,
}

impl SubscriptionRotator {
    pub fn new(endpoint: Url) -> Self {
        Self { endpoint }
    }

    /// Subscribe again with the previous server key and POST the result.
    pub async fn rotate(
        &self,
        previous: Option<&SubscriptionOptions>,
        push: &dyn PushManager,
        network: &dyn Network,
    ) -> Result<PushSubscription, SwError> {
        let previous = previous.ok_or_else(|| {
            SwError::Subscription("no previous subscription to rotate".to_string())
        })?;
        let options = SubscriptionOptions {
            user_visible_only: true,
            application_server_key: previous.application_server_key.clone(),
        };

        let subscription = push.subscribe(&options).await?;
        info!(endpoint = %subscription.endpoint, "Re-subscribed to push");

        let body = serde_json::to_value(&subscription)
            .map_err(|e| SwError::Subscription(e.to_string()))?;
        let request = FetchRequest::post_json(self.endpoint.clone(), &body);
        let response = network.fetch(&request).await?;
        if !response.is_success() {
            warn!(status = response.status, "Subscription update rejected");
            return Err(SwError::Subscription(format!(
                "server answered {} {}",
                response.status, response.status_text
            )));
        }

        Ok(subscription)
    }
}
