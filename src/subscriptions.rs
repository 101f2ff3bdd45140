//! Subscription and tariff operations

use reqwest::Method;
use validator::Validate;

use parq_protocol::{
    PurchaseSubscription, SubscriptionPlan, TariffRule, TariffZone, UserSubscription,
};

use crate::client::ApiClient;
use crate::error::{ParqError, Result};

/// Subscriptions service
pub struct SubscriptionsService {
    client: ApiClient,
}

impl SubscriptionsService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn plans(&self) -> Result<Vec<SubscriptionPlan>> {
        self.client
            .request(Method::GET, "/subscriptions/plans/", None::<&()>)
            .await
    }

    /// The caller's active subscription; absence is not an error
    pub async fn active(&self) -> Result<Option<UserSubscription>> {
        let result: Result<Option<UserSubscription>> = self
            .client
            .request(
                Method::GET,
                "/subscriptions/subscriptions/active/",
                None::<&()>,
            )
            .await;

        match result {
            Ok(subscription) => Ok(subscription),
            Err(ParqError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn purchase(&self, purchase: PurchaseSubscription) -> Result<UserSubscription> {
        purchase.validate()?;
        self.client
            .request(
                Method::POST,
                "/subscriptions/purchase-subscription/",
                Some(&purchase),
            )
            .await
    }

    pub async fn cancel(&self, id: i64) -> Result<()> {
        let endpoint = format!("/subscriptions/subscriptions/{}/cancel/", id);
        let _: serde_json::Value = self
            .client
            .request(Method::POST, &endpoint, None::<&()>)
            .await?;
        Ok(())
    }

    // --- Tariffs ---

    pub async fn zones(&self) -> Result<Vec<TariffZone>> {
        self.client
            .request(Method::GET, "/subscriptions/zones/", None::<&()>)
            .await
    }

    pub async fn rules(&self, zone_id: i64) -> Result<Vec<TariffRule>> {
        let endpoint = format!("/subscriptions/rules/?zone_id={}", zone_id);
        self.client
            .request(Method::GET, &endpoint, None::<&()>)
            .await
    }
}
