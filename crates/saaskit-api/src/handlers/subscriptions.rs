//! Subscription plans, membership, feature flags and usage quotas

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, CurrentUser};
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use saaskit_core::models::{
    CreateSubscriptionRequest, CreateSubscriptionTypeRequest, FeatureAccess,
    IncrementUsageRequest, QuotaStatus, Subscription, SubscriptionType,
    UpdateSubscriptionTypeRequest, UsageResponse, UserSubscription,
};
use saaskit_core::AppError;
use saaskit_services::Permission;

/// List subscription plans
#[utoipa::path(
    get,
    path = "/api/subscriptions/types",
    responses(
        (status = 200, description = "All subscription types", body = Vec<SubscriptionType>)
    ),
    tag = "subscriptions"
)]
pub async fn list_subscription_types(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let types = state.subscriptions.get_subscription_types().await?;
    Ok(Json(types))
}

/// Create a subscription plan
#[utoipa::path(
    post,
    path = "/api/admin/subscription-types",
    request_body = CreateSubscriptionTypeRequest,
    responses(
        (status = 201, description = "Subscription type created", body = SubscriptionType),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "subscriptions"
)]
#[tracing::instrument(skip(state, _admin, request))]
pub async fn create_subscription_type(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ValidatedJson(request): ValidatedJson<CreateSubscriptionTypeRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let created = state.subscriptions.create_subscription_type(request).await?;
    tracing::info!(subscription_type_id = %created.id, name = %created.name, "Subscription type created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a subscription plan
#[utoipa::path(
    put,
    path = "/api/admin/subscription-types/{id}",
    params(("id" = Uuid, Path, description = "Subscription type id")),
    request_body = UpdateSubscriptionTypeRequest,
    responses(
        (status = 200, description = "Subscription type updated", body = SubscriptionType),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Subscription type not found")
    ),
    security(("bearer_auth" = [])),
    tag = "subscriptions"
)]
#[tracing::instrument(skip(state, _admin, request))]
pub async fn update_subscription_type(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateSubscriptionTypeRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let updated = state
        .subscriptions
        .update_subscription_type(id, request)
        .await?;
    Ok(Json(updated))
}

/// Subscribe a user to a plan; the user becomes its owner
#[utoipa::path(
    post,
    path = "/api/admin/subscriptions",
    request_body = CreateSubscriptionRequest,
    responses(
        (status = 201, description = "Subscription created", body = Subscription),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Subscription type not found")
    ),
    security(("bearer_auth" = [])),
    tag = "subscriptions"
)]
#[tracing::instrument(skip(state, _admin, request))]
pub async fn create_subscription(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ValidatedJson(request): ValidatedJson<CreateSubscriptionRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    state
        .subscriptions
        .get_subscription_type_by_id(request.subscription_type_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Subscription type {} not found",
                request.subscription_type_id
            ))
        })?;

    let subscription = state.subscriptions.create_subscription(request).await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

/// Cancel a subscription
#[utoipa::path(
    delete,
    path = "/api/admin/subscriptions/{id}",
    params(("id" = Uuid, Path, description = "Subscription id")),
    responses(
        (status = 200, description = "Subscription cancelled", body = Subscription),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "subscriptions"
)]
#[tracing::instrument(skip(state, _admin))]
pub async fn cancel_subscription(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let subscription = state.subscriptions.cancel_subscription(id).await?;
    Ok(Json(subscription))
}

/// Active subscriptions of the caller
#[utoipa::path(
    get,
    path = "/api/me/subscriptions",
    responses(
        (status = 200, description = "Active subscriptions with their plans", body = Vec<UserSubscription>),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "subscriptions"
)]
pub async fn my_subscriptions(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<impl IntoResponse, HttpAppError> {
    let subscriptions = state
        .subscriptions
        .get_user_subscriptions(current.user.id)
        .await?;
    Ok(Json(subscriptions))
}

/// Whether any active plan of the caller enables a feature flag
#[utoipa::path(
    get,
    path = "/api/me/features/{flag}",
    params(("flag" = String, Path, description = "Feature flag name")),
    responses(
        (status = 200, description = "Feature access", body = FeatureAccess),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "subscriptions"
)]
pub async fn my_feature(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(flag): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let enabled = state
        .subscriptions
        .has_feature_access(current.user.id, &flag)
        .await?;
    Ok(Json(FeatureAccess { flag, enabled }))
}

/// Quota limit and exhaustion for a feature in the current month
#[utoipa::path(
    get,
    path = "/api/me/quotas/{feature}",
    params(("feature" = String, Path, description = "Quota key")),
    responses(
        (status = 200, description = "Quota status; a null limit means unlimited", body = QuotaStatus),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "subscriptions"
)]
pub async fn my_quota(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(feature): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let limit = state
        .subscriptions
        .get_quota_limit(current.user.id, &feature)
        .await?;
    let exceeded = state
        .subscriptions
        .has_exceeded_quota(current.user.id, &feature)
        .await?;
    Ok(Json(QuotaStatus {
        feature,
        limit,
        exceeded,
    }))
}

/// Record usage against a subscription the caller belongs to
#[utoipa::path(
    post,
    path = "/api/subscriptions/{id}/usage",
    params(("id" = Uuid, Path, description = "Subscription id")),
    request_body = IncrementUsageRequest,
    responses(
        (status = 200, description = "Usage after the increment", body = UsageResponse),
        (status = 400, description = "Invalid amount or month"),
        (status = 403, description = "Caller is not a member of the subscription")
    ),
    security(("bearer_auth" = [])),
    tag = "subscriptions"
)]
#[tracing::instrument(skip(state, current, request), fields(user_id = %current.user.id))]
pub async fn record_usage(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(subscription_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<IncrementUsageRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;

    let is_member = state
        .subscriptions
        .get_subscription_users(subscription_id)
        .await?
        .iter()
        .any(|member| member.user_id == current.user.id);
    let can_manage = state
        .permissions
        .has_permission(&current.user.role, Permission::AdminAccess);
    if !is_member && !can_manage {
        return Err(AppError::Forbidden(
            "Not a member of this subscription".to_string(),
        )
        .into());
    }

    let consumption = state
        .subscriptions
        .increment_usage(
            subscription_id,
            &request.feature,
            request.amount.unwrap_or(1),
            request.month.as_deref(),
        )
        .await?;
    Ok(Json(UsageResponse {
        subscription_id: consumption.subscription_id,
        feature: consumption.feature,
        month: consumption.month,
        usage: consumption.usage,
    }))
}
