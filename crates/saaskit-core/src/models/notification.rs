use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Delivery channel of a notification type
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    #[default]
    Email,
    Sms,
    Push,
}

/// Notification type as exposed by the API. Field names match the
/// create/update request bodies; rows decode through the column aliases.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationType {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(alias = "enabled_by_default")]
    pub enabled_by_default: bool,
    pub channel: NotificationChannel,
    pub category: String,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Explicit per-user choice for one notification type
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationPreference {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_id: Uuid,
    pub preference: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Notification type with the effective setting for a user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserNotificationPreference {
    pub notification_type: NotificationType,
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationTypeRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Notification name must be between 1 and 255 characters"
    ))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled_by_default: bool,
    #[serde(default)]
    pub channel: NotificationChannel,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNotificationTypeRequest {
    #[serde(default)]
    #[validate(length(
        min = 1,
        max = 255,
        message = "Notification name must be between 1 and 255 characters"
    ))]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled_by_default: Option<bool>,
    #[serde(default)]
    pub channel: Option<NotificationChannel>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Body of `POST /api/user/notification-preferences`. Fields are optional so a
/// missing one maps to a 400 with a specific message rather than a parse error.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetNotificationPreferenceRequest {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub notification_id: Option<Uuid>,
    #[serde(default)]
    pub preference: Option<bool>,
}
