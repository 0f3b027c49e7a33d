//! Health check handlers and response types.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use saaskit_core::DatabaseBackend;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
pub(super) struct HealthCheckResponse {
    pub status: &'static str,
    pub environment: String,
    pub database_backend: &'static str,
    pub database: String,
    pub payment: String,
}

/// Liveness probe - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Readiness probe - the database answers within the timeout.
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = check_database(&state).await;
    let ready = database.is_ok();
    let body = serde_json::json!({
        "status": if ready { "ready" } else { "not_ready" },
        "database": database.unwrap_or_else(|e| e),
    });

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

/// Summary of the configured backends.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = check_database(&state).await;
    let healthy = database.is_ok();

    let response = HealthCheckResponse {
        status: if healthy { "healthy" } else { "degraded" },
        environment: state.config.environment().to_string(),
        database_backend: match state.config.database_backend() {
            DatabaseBackend::Postgres => "postgres",
            DatabaseBackend::Memory => "memory",
        },
        database: database.unwrap_or_else(|e| e),
        payment: state.config.payment_selection().backend.to_string(),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

async fn check_database(state: &AppState) -> Result<String, String> {
    match tokio::time::timeout(CHECK_TIMEOUT, state.providers.database.ping()).await {
        Ok(Ok(())) => Ok("ready".to_string()),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Database readiness check failed");
            Err(format!("not_ready: {}", e))
        }
        Err(_) => {
            tracing::error!("Database readiness check timed out");
            Err("timeout".to_string())
        }
    }
}
