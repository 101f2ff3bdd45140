//! Subscriptions and tariff API DTOs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A purchasable subscription plan from GET /api/subscriptions/plans/
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub duration_days: u32,
    pub price: f64,
    pub discount_percentage: f64,
}

/// The user's active subscription, if any
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSubscription {
    pub id: i64,
    pub plan_details: SubscriptionPlan,
    pub start_date: String,
    pub end_date: String,
    pub status: String,
    pub auto_renew: bool,
}

/// Purchase request for POST /api/subscriptions/purchase-subscription/
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PurchaseSubscription {
    pub plan_id: i64,
    pub payment_method_id: i64,
    pub auto_renew: bool,
}

/// A tariff zone from GET /api/subscriptions/zones/
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffZone {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A pricing rule from GET /api/subscriptions/rules/?zone_id=...
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffRule {
    pub id: i64,
    pub name: String,
    pub zone_name: String,
    #[serde(default)]
    pub parking_spot_name: Option<String>,
    pub time_period: String,
    pub day_type: String,
    pub price_per_hour: f64,
}
