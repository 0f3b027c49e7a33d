//! Application setup and initialization
//!
//! Everything `main` needs to go from configuration to a served router.

pub mod database;
pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use saaskit_core::{Config, DatabaseBackend};
use saaskit_db::PostgresDatabaseProvider;
use saaskit_services::{AuthProvider, Providers};
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_telemetry();

    // Fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;
    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let mut builder = Providers::builder(&config);
    if config.database_backend() == DatabaseBackend::Postgres {
        let pool = database::setup_database(&config).await?;
        builder = builder.with_database(Arc::new(PostgresDatabaseProvider::new(pool)));
    }
    let providers = builder.build().await.context("Failed to build providers")?;

    spawn_session_logger(providers.auth.as_ref());

    let state = Arc::new(AppState::new(config.clone(), providers));
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}

/// Log session lifecycle events when the auth provider publishes them.
fn spawn_session_logger(auth: &dyn AuthProvider) {
    let Some(mut events) = auth.session_events() else {
        tracing::debug!("Auth provider does not publish session events");
        return;
    };

    tokio::spawn(async move {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match events.recv().await {
                Ok(event) => tracing::info!(event = ?event, "Session event"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Session event listener lagged")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
