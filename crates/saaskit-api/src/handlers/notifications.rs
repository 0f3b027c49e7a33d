//! Notification type administration and per-user preferences
//!
//! Type management requires an admin. The preference routes carry no auth
//! check; callers name the user explicitly.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::handlers::SuccessResponse;
use crate::state::AppState;
use saaskit_core::models::{
    CreateNotificationTypeRequest, NotificationPreference, NotificationType,
    SetNotificationPreferenceRequest, UpdateNotificationTypeRequest, UserNotificationPreference,
};
use saaskit_core::AppError;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationTypesResponse {
    pub notification_types: Vec<NotificationType>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationTypeResponse {
    pub notification_type: NotificationType,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PreferencesResponse {
    pub preferences: Vec<UserNotificationPreference>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PreferenceResponse {
    pub preference: NotificationPreference,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesQuery {
    pub user_id: Option<String>,
}

/// List notification types
#[utoipa::path(
    get,
    path = "/api/admin/notifications",
    responses(
        (status = 200, description = "All notification types", body = NotificationTypesResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn list_notification_types(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, HttpAppError> {
    let notification_types = state.notifications.get_all_notification_types().await?;
    Ok(Json(NotificationTypesResponse { notification_types }))
}

/// Create a notification type
#[utoipa::path(
    post,
    path = "/api/admin/notifications",
    request_body = CreateNotificationTypeRequest,
    responses(
        (status = 201, description = "Notification type created", body = NotificationTypeResponse),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
#[tracing::instrument(skip(state, _admin, request))]
pub async fn create_notification_type(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ValidatedJson(request): ValidatedJson<CreateNotificationTypeRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let notification_type = state.notifications.create_notification_type(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(NotificationTypeResponse { notification_type }),
    ))
}

/// Get a notification type
#[utoipa::path(
    get,
    path = "/api/admin/notifications/{id}",
    params(("id" = Uuid, Path, description = "Notification type id")),
    responses(
        (status = 200, description = "Notification type", body = NotificationTypeResponse),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Notification type not found")
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn get_notification_type(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let notification_type = state
        .notifications
        .get_notification_type_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification type not found".to_string()))?;
    Ok(Json(NotificationTypeResponse { notification_type }))
}

/// Update a notification type
#[utoipa::path(
    put,
    path = "/api/admin/notifications/{id}",
    params(("id" = Uuid, Path, description = "Notification type id")),
    request_body = UpdateNotificationTypeRequest,
    responses(
        (status = 200, description = "Notification type updated", body = NotificationTypeResponse),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Notification type not found")
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
#[tracing::instrument(skip(state, _admin, request))]
pub async fn update_notification_type(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateNotificationTypeRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let notification_type = state
        .notifications
        .update_notification_type(id, request)
        .await?;
    Ok(Json(NotificationTypeResponse { notification_type }))
}

/// Delete a notification type
#[utoipa::path(
    delete,
    path = "/api/admin/notifications/{id}",
    params(("id" = Uuid, Path, description = "Notification type id")),
    responses(
        (status = 200, description = "Notification type deleted", body = SuccessResponse),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
#[tracing::instrument(skip(state, _admin))]
pub async fn delete_notification_type(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.notifications.delete_notification_type(id).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Effective notification settings of a user
#[utoipa::path(
    get,
    path = "/api/user/notification-preferences",
    params(("userId" = Uuid, Query, description = "User id")),
    responses(
        (status = 200, description = "Every notification type with the user's setting", body = PreferencesResponse),
        (status = 400, description = "User ID is required")
    ),
    tag = "notifications"
)]
pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PreferencesQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let user_id = query
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("User ID is required".to_string()))?;
    let user_id = Uuid::parse_str(&user_id).map_err(AppError::from)?;

    let preferences = state
        .notifications
        .get_user_notification_preferences(user_id)
        .await?;
    Ok(Json(PreferencesResponse { preferences }))
}

/// Set a user's preference for one notification type
#[utoipa::path(
    post,
    path = "/api/user/notification-preferences",
    request_body = SetNotificationPreferenceRequest,
    responses(
        (status = 200, description = "Stored preference", body = PreferenceResponse),
        (status = 400, description = "userId, notificationId, and preference are required")
    ),
    tag = "notifications"
)]
#[tracing::instrument(skip(state, request))]
pub async fn set_preference(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<SetNotificationPreferenceRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let (Some(user_id), Some(notification_id), Some(preference)) =
        (request.user_id, request.notification_id, request.preference)
    else {
        return Err(AppError::BadRequest(
            "userId, notificationId, and preference are required".to_string(),
        )
        .into());
    };

    let preference = state
        .notifications
        .set_user_notification_preference(user_id, notification_id, preference)
        .await?;
    Ok(Json(PreferenceResponse { preference }))
}
