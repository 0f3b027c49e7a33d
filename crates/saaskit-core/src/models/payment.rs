use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Billing interval of a subscription type price
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Monthly,
    Annual,
}

/// Status of a subscription on the payment vendor side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentSubscriptionStatus {
    Active,
    Canceled,
    PastDue,
    Incomplete,
    Trialing,
    /// Any status not listed above (e.g. `unpaid`, `paused`)
    #[serde(other)]
    Other,
}

/// Subscription as seen by the payment provider
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentSubscription {
    pub id: String,
    pub customer_id: String,
    pub price_id: String,
    pub status: PaymentSubscriptionStatus,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
}

/// Payment customer created for a user; only the owner may check out or open
/// the billing portal with it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCustomer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customer_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreatePaymentSubscriptionParams {
    pub customer_id: String,
    pub price_id: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct CheckoutParams {
    pub customer_id: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub url: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PortalSession {
    pub url: String,
}

/// Verified webhook event; `data` is the event's `data.object`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub subscription_type_id: Uuid,
    pub interval: BillingInterval,
    /// Existing payment customer of the caller; their recorded customer is
    /// reused, or one is created from their email, when absent
    #[serde(default)]
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PortalRequest {
    #[validate(length(min = 1, message = "Customer ID is required"))]
    pub customer_id: String,
    #[serde(default)]
    pub return_url: Option<String>,
}
