//! Checkout, billing portal and payment webhooks

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use saaskit_core::models::{CheckoutRequest, CheckoutSession, PortalRequest, PortalSession};
use saaskit_core::AppError;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    pub event_id: String,
    pub event_type: String,
}

/// Receive a signed payment event
///
/// The body is read raw; any change to it breaks the signature.
#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    request_body(content = String, description = "Raw event payload", content_type = "application/json"),
    params(("Stripe-Signature" = String, Header, description = "t=<timestamp>,v1=<hex hmac>")),
    responses(
        (status = 200, description = "Event verified", body = WebhookAck),
        (status = 400, description = "Missing or invalid signature")
    ),
    tag = "payments"
)]
#[tracing::instrument(skip(state, headers, payload), fields(payload_len = payload.len()))]
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: String,
) -> Result<impl IntoResponse, HttpAppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::WebhookSignature("Missing signature header".to_string()))?;

    let event = state.billing.handle_webhook(&payload, signature).await?;
    Ok(Json(WebhookAck {
        received: true,
        event_id: event.id,
        event_type: event.event_type,
    }))
}

/// Start a hosted checkout for a plan
#[utoipa::path(
    post,
    path = "/api/payments/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Checkout session", body = CheckoutSession),
        (status = 400, description = "Plan has no price for the interval"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Customer belongs to another user"),
        (status = 404, description = "Subscription type not found")
    ),
    security(("bearer_auth" = [])),
    tag = "payments"
)]
#[tracing::instrument(skip(state, current, request), fields(user_id = %current.user.id))]
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ValidatedJson(request): ValidatedJson<CheckoutRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let session = state
        .billing
        .create_checkout_session(&current.user, request)
        .await?;
    Ok(Json(session))
}

/// Open the billing portal for one of the caller's customers
#[utoipa::path(
    post,
    path = "/api/payments/portal",
    request_body = PortalRequest,
    responses(
        (status = 200, description = "Portal session", body = PortalSession),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Customer belongs to another user")
    ),
    security(("bearer_auth" = [])),
    tag = "payments"
)]
#[tracing::instrument(skip(state, current, request), fields(user_id = %current.user.id))]
pub async fn portal(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ValidatedJson(request): ValidatedJson<PortalRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let session = state
        .billing
        .create_portal_session(
            &current.user,
            &request.customer_id,
            request.return_url.as_deref(),
        )
        .await?;
    Ok(Json(session))
}
