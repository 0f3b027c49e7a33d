//! FAQ browsing and search, support tickets

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, CurrentUser};
use crate::error::{HttpAppError, ValidatedJson};
use crate::handlers::SuccessResponse;
use crate::state::AppState;
use saaskit_core::models::{
    CreateFaqRequest, CreateTicketRequest, FaqEntry, FaqSearchResult, SupportTicket,
    UpdateFaqRequest, UpdateTicketRequest,
};

#[derive(Debug, Deserialize)]
pub struct FaqListQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FaqSearchQuery {
    #[serde(default)]
    pub q: String,
}

/// List FAQ entries, optionally for one category
#[utoipa::path(
    get,
    path = "/api/faqs",
    params(("category" = Option<String>, Query, description = "Only entries of this category")),
    responses(
        (status = 200, description = "Entries ordered by category then position", body = Vec<FaqEntry>)
    ),
    tag = "support"
)]
pub async fn list_faqs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FaqListQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let faqs = match query.category.filter(|c| !c.is_empty()) {
        Some(category) => state.support.get_faqs_by_category(&category).await?,
        None => state.support.get_all_faqs().await?,
    };
    Ok(Json(faqs))
}

/// Relevance-ranked FAQ search
#[utoipa::path(
    get,
    path = "/api/faqs/search",
    params(("q" = String, Query, description = "Search text; empty returns every entry")),
    responses(
        (status = 200, description = "Matches, most relevant first", body = Vec<FaqSearchResult>)
    ),
    tag = "support"
)]
#[tracing::instrument(skip(state))]
pub async fn search_faqs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FaqSearchQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let results = state.support.search_faqs(&query.q).await?;
    Ok(Json(results))
}

/// Distinct FAQ categories
#[utoipa::path(
    get,
    path = "/api/faqs/categories",
    responses((status = 200, description = "Categories in ascending order", body = Vec<String>)),
    tag = "support"
)]
pub async fn faq_categories(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let categories = state.support.get_faq_categories().await?;
    Ok(Json(categories))
}

/// Create a FAQ entry
#[utoipa::path(
    post,
    path = "/api/admin/faqs",
    request_body = CreateFaqRequest,
    responses(
        (status = 201, description = "Entry created", body = FaqEntry),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "support"
)]
#[tracing::instrument(skip(state, admin, request))]
pub async fn create_faq(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    ValidatedJson(request): ValidatedJson<CreateFaqRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let faq = state.support.create_faq(request, Some(admin.0.user.id)).await?;
    Ok((StatusCode::CREATED, Json(faq)))
}

/// Update a FAQ entry
#[utoipa::path(
    put,
    path = "/api/admin/faqs/{id}",
    params(("id" = Uuid, Path, description = "FAQ entry id")),
    request_body = UpdateFaqRequest,
    responses(
        (status = 200, description = "Entry updated", body = FaqEntry),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Entry not found")
    ),
    security(("bearer_auth" = [])),
    tag = "support"
)]
#[tracing::instrument(skip(state, _admin, request))]
pub async fn update_faq(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateFaqRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let faq = state.support.update_faq(id, request).await?;
    Ok(Json(faq))
}

/// Delete a FAQ entry
#[utoipa::path(
    delete,
    path = "/api/admin/faqs/{id}",
    params(("id" = Uuid, Path, description = "FAQ entry id")),
    responses(
        (status = 200, description = "Entry deleted", body = SuccessResponse),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "support"
)]
#[tracing::instrument(skip(state, _admin))]
pub async fn delete_faq(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    state.support.delete_faq(id).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Open a support ticket
#[utoipa::path(
    post,
    path = "/api/support/tickets",
    request_body = CreateTicketRequest,
    responses(
        (status = 201, description = "Ticket opened", body = SupportTicket),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "support"
)]
#[tracing::instrument(skip(state, current, request), fields(user_id = %current.user.id))]
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    ValidatedJson(request): ValidatedJson<CreateTicketRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate()?;
    let ticket = state.support.create_ticket(current.user.id, request).await?;
    tracing::info!(ticket_id = %ticket.id, "Support ticket opened");
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Tickets opened by the caller
#[utoipa::path(
    get,
    path = "/api/support/tickets",
    responses(
        (status = 200, description = "The caller's tickets", body = Vec<SupportTicket>),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "support"
)]
pub async fn my_tickets(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
) -> Result<impl IntoResponse, HttpAppError> {
    let tickets = state.support.get_user_tickets(current.user.id).await?;
    Ok(Json(tickets))
}

/// Every ticket
#[utoipa::path(
    get,
    path = "/api/admin/support/tickets",
    responses(
        (status = 200, description = "All tickets", body = Vec<SupportTicket>),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "support"
)]
pub async fn all_tickets(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, HttpAppError> {
    let tickets = state.support.get_all_tickets().await?;
    Ok(Json(tickets))
}

/// Respond to or change the status of a ticket
#[utoipa::path(
    put,
    path = "/api/admin/support/tickets/{id}",
    params(("id" = Uuid, Path, description = "Ticket id")),
    request_body = UpdateTicketRequest,
    responses(
        (status = 200, description = "Ticket updated", body = SupportTicket),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Ticket not found")
    ),
    security(("bearer_auth" = [])),
    tag = "support"
)]
#[tracing::instrument(skip(state, _admin, request))]
pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateTicketRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let ticket = state.support.update_ticket(id, request).await?;
    Ok(Json(ticket))
}
