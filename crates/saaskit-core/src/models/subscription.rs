use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Subscription lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
    Suspended,
}

impl Display for SubscriptionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SubscriptionStatus::Active => write!(f, "active"),
            SubscriptionStatus::Cancelled => write!(f, "cancelled"),
            SubscriptionStatus::Expired => write!(f, "expired"),
            SubscriptionStatus::Suspended => write!(f, "suspended"),
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            "expired" => Ok(SubscriptionStatus::Expired),
            "suspended" => Ok(SubscriptionStatus::Suspended),
            _ => Err(anyhow::anyhow!("Invalid subscription status: {}", s)),
        }
    }
}

pub type FeatureFlags = BTreeMap<String, bool>;
pub type QuotaLimits = BTreeMap<String, i64>;

/// Plan template defining feature flags and quota ceilings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionType {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub marketing_points: Option<Vec<String>>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub feature_flags: FeatureFlags,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub quota_limits: QuotaLimits,
    #[serde(default)]
    pub price_monthly: Option<f64>,
    #[serde(default)]
    pub price_annual: Option<f64>,
    #[serde(default)]
    pub stripe_monthly_id: Option<String>,
    #[serde(default)]
    pub stripe_annual_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Subscription {
    pub id: Uuid,
    pub subscription_type_id: Uuid,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    pub status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Membership of a user in a subscription
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionUser {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
}

/// Monthly usage counter for one feature of one subscription
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionConsumption {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub feature: String,
    pub usage: i64,
    /// First day of the month, `YYYY-MM-01`
    pub month: String,
}

/// Active subscription resolved for a user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserSubscription {
    pub subscription: Subscription,
    pub subscription_type: SubscriptionType,
    pub role: String,
}

/// Request DTO for creating a subscription type
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateSubscriptionTypeRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Subscription type name must be between 1 and 255 characters"
    ))]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing_points: Option<Vec<String>>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub feature_flags: FeatureFlags,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub quota_limits: QuotaLimits,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_monthly: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_annual: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_monthly_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_annual_id: Option<String>,
}

/// Request DTO for updating a subscription type; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateSubscriptionTypeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(
        min = 1,
        max = 255,
        message = "Subscription type name must be between 1 and 255 characters"
    ))]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing_points: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub feature_flags: Option<FeatureFlags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub quota_limits: Option<QuotaLimits>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_monthly: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_annual: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_monthly_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_annual_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateSubscriptionRequest {
    pub subscription_type_id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateSubscriptionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SubscriptionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

/// Request DTO for recording feature usage
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct IncrementUsageRequest {
    #[validate(length(min = 1, max = 255, message = "Feature must not be empty"))]
    pub feature: String,
    #[serde(default)]
    #[validate(range(min = 1, message = "Amount must be positive"))]
    pub amount: Option<i64>,
    /// `YYYY-MM` or `YYYY-MM-DD`; defaults to the current month
    #[serde(default)]
    pub month: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UsageResponse {
    pub subscription_id: Uuid,
    pub feature: String,
    pub month: String,
    pub usage: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuotaStatus {
    pub feature: String,
    /// `None` means unlimited
    pub limit: Option<i64>,
    pub exceeded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeatureAccess {
    pub flag: String,
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscription_type_deserializes_from_row() {
        let row = json!({
            "id": "6c1f1a3e-3c5b-4f0a-9a6e-0d8c2f8b2b10",
            "name": "Pro",
            "description": null,
            "marketing_points": ["Priority support"],
            "feature_flags": {"advanced_reports": true},
            "quota_limits": {"api_calls": 500},
            "price_monthly": 19.0,
            "price_annual": null,
            "stripe_monthly_id": "price_123",
            "stripe_annual_id": null,
            "created_at": "2024-03-01T00:00:00Z",
            "updated_at": "2024-03-01T00:00:00+00:00"
        });
        let ty: SubscriptionType = serde_json::from_value(row).unwrap();
        assert_eq!(ty.quota_limits.get("api_calls"), Some(&500));
        assert_eq!(ty.feature_flags.get("advanced_reports"), Some(&true));
    }

    #[test]
    fn test_update_request_skips_absent_fields() {
        let req = UpdateSubscriptionRequest {
            status: Some(SubscriptionStatus::Cancelled),
            end_date: None,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"status": "cancelled"})
        );
    }
}
