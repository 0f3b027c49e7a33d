//! User profiles: self service and administration

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, CurrentUser};
use crate::error::{HttpAppError, ValidatedJson};
use crate::handlers::SuccessResponse;
use crate::state::AppState;
use saaskit_core::constants::{DEFAULT_PAGE_SIZE, ROLE_ADMIN, ROLE_GUEST, ROLE_USER};
use saaskit_core::models::{
    CreateUserRequest, PaginatedResult, QueryOptions, UpdateProfileRequest, UserProfile,
};
use saaskit_core::AppError;

/// Column matched by the `search` parameter
const SEARCH_COLUMN: &str = "email";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub search: Option<String>,
    pub order_by: Option<String>,
    pub ascending: Option<bool>,
    pub role: Option<String>,
}

impl ListUsersQuery {
    fn into_options(self) -> QueryOptions {
        let mut options = QueryOptions::new(
            self.page.unwrap_or(1),
            self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        );
        if let Some(role) = self.role.filter(|r| !r.is_empty()) {
            options = options.with_filter("role", role);
        }
        if let Some(term) = self.search.filter(|s| !s.trim().is_empty()) {
            options = options.with_search(SEARCH_COLUMN, term.trim());
        }
        if let Some(column) = self.order_by.filter(|c| !c.is_empty()) {
            options = options.with_order(column, self.ascending.unwrap_or(true));
        }
        options
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetRoleRequest {
    pub role: String,
}

/// Profile of the caller
#[utoipa::path(
    get,
    path = "/api/me/profile",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "No profile row for this user")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn my_profile(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<impl IntoResponse, HttpAppError> {
    let profile = state
        .users
        .get_user_profile(current.user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
    Ok(Json(profile))
}

/// Update the caller's name or avatar
#[utoipa::path(
    put,
    path = "/api/me/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserProfile),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
#[tracing::instrument(skip(state, current, request), fields(user_id = %current.user.id))]
pub async fn update_my_profile(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ValidatedJson(request): ValidatedJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let profile = state.users.update_profile(current.user.id, request).await?;
    Ok(Json(profile))
}

/// Page through user profiles
#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(
        ("page" = Option<u32>, Query, description = "1-indexed page"),
        ("pageSize" = Option<u32>, Query, description = "Rows per page, at most 100"),
        ("search" = Option<String>, Query, description = "Case-insensitive email substring"),
        ("orderBy" = Option<String>, Query, description = "Column to sort by"),
        ("ascending" = Option<bool>, Query, description = "Sort direction, default true"),
        ("role" = Option<String>, Query, description = "Only users with this role")
    ),
    responses(
        (status = 200, description = "One page of profiles", body = PaginatedResult<UserProfile>),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
#[tracing::instrument(skip(state, _admin, query))]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let page = state
        .users
        .list_users_paginated(query.into_options())
        .await?;
    Ok(Json(page))
}

/// Create an account and its profile
#[utoipa::path(
    post,
    path = "/api/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserProfile),
        (status = 400, description = "Invalid input or sign up rejected"),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
#[tracing::instrument(skip(state, _admin, request))]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    ValidatedJson(request): ValidatedJson<CreateUserRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let profile = state.users.create_user(request).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Get a user's profile
#[utoipa::path(
    get,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let profile = state
        .users
        .get_user_profile(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
    Ok(Json(profile))
}

/// Change a user's role
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserProfile),
        (status = 400, description = "Unknown role"),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
#[tracing::instrument(skip(state, _admin, request))]
pub async fn set_user_role(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<SetRoleRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    if ![ROLE_ADMIN, ROLE_USER, ROLE_GUEST].contains(&request.role.as_str()) {
        return Err(AppError::BadRequest(format!("Unknown role '{}'", request.role)).into());
    }
    let profile = state.users.set_role(id, &request.role).await?;
    tracing::info!(user_id = %id, role = %profile.role, "User role changed");
    Ok(Json(profile))
}

/// Delete a user's profile
#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Profile deleted", body = SuccessResponse),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
#[tracing::instrument(skip(state, _admin))]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.users.delete_user(id).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_maps_to_options() {
        let options = ListUsersQuery {
            page: Some(3),
            page_size: None,
            search: Some("  jane ".to_string()),
            order_by: Some("created_at".to_string()),
            ascending: Some(false),
            role: Some("admin".to_string()),
        }
        .into_options();

        assert_eq!(options.page, 3);
        assert_eq!(options.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(options.filters["role"], "admin");
        let search = options.search.unwrap();
        assert_eq!(search.column, "email");
        assert_eq!(search.term, "jane");
        let order = options.order_by.unwrap();
        assert_eq!(order.column, "created_at");
        assert!(!order.ascending);
    }

    #[test]
    fn test_empty_query_has_no_search_or_order() {
        let options = ListUsersQuery {
            page: None,
            page_size: None,
            search: Some("   ".to_string()),
            order_by: Some(String::new()),
            ascending: None,
            role: None,
        }
        .into_options();
        assert_eq!(options.page, 1);
        assert!(options.search.is_none());
        assert!(options.order_by.is_none());
        assert!(options.filters.is_empty());
    }
}
