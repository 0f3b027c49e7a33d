//! Authentication handlers
//!
//! Sign up, sign in, token refresh, password reset, OAuth redirect URLs and
//! TOTP multi-factor management. Tokens come from the auth provider and are
//! returned to the caller as-is.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::error::{HttpAppError, ValidatedJson};
use crate::handlers::SuccessResponse;
use crate::state::AppState;
use saaskit_core::models::{
    AuthSession, LoginRequest, MfaEnrollment, MfaFactor, MfaVerifyParams, OAuthProvider,
    PasswordResetRequest, RefreshRequest, RegisterRequest, User,
};
use saaskit_core::AppError;

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OAuthUrlResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthQuery {
    pub redirect_to: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollMfaRequest {
    #[serde(default)]
    pub friendly_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MfaFactorsResponse {
    pub factors: Vec<MfaFactor>,
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Invalid input or sign up rejected by the auth provider")
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(state, request))]
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let user = state.auth.register(request).await?;
    tracing::info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(UserResponse { user })))
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/api/auth/signin",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthSession),
        (status = 400, description = "Invalid credentials")
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(state, request))]
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let session = state.auth.login(request).await?;
    Ok(Json(session))
}

/// Revoke the caller's session
#[utoipa::path(
    post,
    path = "/api/auth/signout",
    responses(
        (status = 200, description = "Signed out", body = SuccessResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
#[tracing::instrument(skip(state, current), fields(user_id = %current.user.id))]
pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<impl IntoResponse, HttpAppError> {
    state.auth.logout(&current.access_token).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Exchange a refresh token for a new session
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Session refreshed", body = AuthSession),
        (status = 400, description = "Refresh token rejected")
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(state, request))]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let session = state.auth.refresh(&request.refresh_token).await?;
    Ok(Json(session))
}

/// Send a password reset email
#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Reset email requested", body = SuccessResponse),
        (status = 400, description = "Invalid email")
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(state, request))]
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<PasswordResetRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    state.auth.request_password_reset(&request.email).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Authorization URL for an OAuth provider
#[utoipa::path(
    get,
    path = "/api/auth/oauth/{provider}",
    params(
        ("provider" = String, Path, description = "google, azure or apple"),
        ("redirectTo" = Option<String>, Query, description = "Where the provider sends the user back")
    ),
    responses(
        (status = 200, description = "Authorization URL", body = OAuthUrlResponse),
        (status = 400, description = "Unsupported provider")
    ),
    tag = "auth"
)]
#[tracing::instrument(skip(state, query))]
pub async fn oauth_url(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<OAuthQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let provider: OAuthProvider = provider
        .parse()
        .map_err(|e: anyhow::Error| AppError::BadRequest(e.to_string()))?;
    let url = state
        .auth
        .login_with_oauth(provider, query.redirect_to.as_deref())
        .await?;
    Ok(Json(OAuthUrlResponse { url }))
}

/// The authenticated caller
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me(current: CurrentUser) -> Json<UserResponse> {
    Json(UserResponse { user: current.user })
}

/// Start TOTP enrollment
#[utoipa::path(
    post,
    path = "/api/auth/mfa/enroll",
    request_body = EnrollMfaRequest,
    responses(
        (status = 200, description = "Enrollment started", body = MfaEnrollment),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
#[tracing::instrument(skip(state, current, request), fields(user_id = %current.user.id))]
pub async fn enroll_mfa(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ValidatedJson(request): ValidatedJson<EnrollMfaRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let enrollment = state
        .auth
        .enroll_mfa(&current.access_token, request.friendly_name.as_deref())
        .await?;
    Ok(Json(enrollment))
}

/// Verify a TOTP code for a factor
#[utoipa::path(
    post,
    path = "/api/auth/mfa/verify",
    request_body = MfaVerifyParams,
    responses(
        (status = 200, description = "Factor verified", body = SuccessResponse),
        (status = 400, description = "Code rejected"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
#[tracing::instrument(skip(state, current, params), fields(user_id = %current.user.id))]
pub async fn verify_mfa(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ValidatedJson(params): ValidatedJson<MfaVerifyParams>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.auth.verify_mfa(&current.access_token, params).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// TOTP factors of the caller
#[utoipa::path(
    get,
    path = "/api/auth/mfa/factors",
    responses(
        (status = 200, description = "Enrolled factors", body = MfaFactorsResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn list_mfa_factors(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<impl IntoResponse, HttpAppError> {
    let factors = state.auth.list_mfa_factors(&current.access_token).await?;
    Ok(Json(MfaFactorsResponse { factors }))
}

/// Remove a factor
#[utoipa::path(
    delete,
    path = "/api/auth/mfa/factors/{id}",
    params(("id" = String, Path, description = "Factor id")),
    responses(
        (status = 200, description = "Factor removed", body = SuccessResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
#[tracing::instrument(skip(state, current), fields(user_id = %current.user.id))]
pub async fn unenroll_mfa(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(factor_id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    state
        .auth
        .unenroll_mfa(&current.access_token, &factor_id)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}
