//! Web-push subscription registration

use reqwest::Method;

use parq_protocol::{PushKeys, PushSubscription, SubscribeRequest};

use crate::client::ApiClient;
use crate::error::{ParqError, Result};

/// Notifications service
pub struct NotificationsService {
    client: ApiClient,
}

impl NotificationsService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// The public VAPID key push subscriptions must be created against
    pub fn vapid_public_key(&self) -> Result<String> {
        self.client
            .config()
            .vapid_public_key
            .clone()
            .ok_or_else(|| ParqError::config("No VAPID public key configured"))
    }

    /// Register a push subscription with the backend
    pub async fn subscribe(&self, endpoint: String, p256dh: String, auth: String) -> Result<()> {
        let request = SubscribeRequest {
            subscription: PushSubscription {
                endpoint,
                keys: PushKeys { p256dh, auth },
            },
        };
        let _: serde_json::Value = self
            .client
            .request(Method::POST, "/notifications/subscribe/", Some(&request))
            .await?;
        Ok(())
    }
}
