//! Web-push notification API DTOs

use serde::{Deserialize, Serialize};

/// Browser push-subscription keys
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

/// A web-push subscription as produced by the push service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    pub keys: PushKeys,
}

/// Registration request for POST /api/notifications/subscribe/
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub subscription: PushSubscription,
}
