//! Vendor providers and the bundle the rest of the service is built on.
//!
//! [`Providers`] is constructed once at startup from [`Config`] and handed to
//! every service and to the HTTP state. Tests replace any single provider
//! through [`ProvidersBuilder`].

mod auth;
mod mock_payment;
mod payment;
mod stripe;
mod supabase;

pub use auth::{resolve_role, AuthProvider, SessionEvent};
pub use mock_payment::{
    MockPaymentProvider, MOCK_CHECKOUT_URL, MOCK_CUSTOMER_ID, MOCK_EVENT_TYPE, MOCK_PORTAL_URL,
    MOCK_SUBSCRIPTION_ID,
};
pub use payment::PaymentProvider;
pub use stripe::{verify_webhook_signature, StripePaymentProvider, STRIPE_API_BASE};
pub use supabase::SupabaseAuthProvider;

use anyhow::{Context, Result};
use saaskit_core::{Config, DatabaseBackend, PaymentBackend};
use saaskit_db::{DatabaseProvider, MemoryDatabaseProvider, PostgresDatabaseProvider};
use std::sync::Arc;
use std::time::Duration;

/// The `{database, auth, payment}` provider bundle.
#[derive(Clone)]
pub struct Providers {
    pub database: Arc<dyn DatabaseProvider>,
    pub auth: Arc<dyn AuthProvider>,
    pub payment: Arc<dyn PaymentProvider>,
}

impl Providers {
    /// Build every provider from configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::builder(config).build().await
    }

    pub fn builder(config: &Config) -> ProvidersBuilder<'_> {
        ProvidersBuilder {
            config,
            database: None,
            auth: None,
            payment: None,
        }
    }
}

/// Builds [`Providers`], letting callers override any single provider.
pub struct ProvidersBuilder<'a> {
    config: &'a Config,
    database: Option<Arc<dyn DatabaseProvider>>,
    auth: Option<Arc<dyn AuthProvider>>,
    payment: Option<Arc<dyn PaymentProvider>>,
}

impl<'a> ProvidersBuilder<'a> {
    pub fn with_database(mut self, database: Arc<dyn DatabaseProvider>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_payment(mut self, payment: Arc<dyn PaymentProvider>) -> Self {
        self.payment = Some(payment);
        self
    }

    pub async fn build(self) -> Result<Providers> {
        let config = self.config;

        let database = match self.database {
            Some(database) => database,
            None => database_from_config(config).await?,
        };

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_client_timeout_secs()))
            .build()
            .context("Failed to build HTTP client")?;

        let auth: Arc<dyn AuthProvider> = match self.auth {
            Some(auth) => auth,
            None => Arc::new(SupabaseAuthProvider::new(
                http_client.clone(),
                config.supabase_url(),
                config.supabase_anon_key(),
                config.app_url(),
                database.clone(),
            )),
        };

        let payment: Arc<dyn PaymentProvider> = match self.payment {
            Some(payment) => payment,
            None => payment_from_config(config, http_client)?,
        };

        Ok(Providers {
            database,
            auth,
            payment,
        })
    }
}

async fn database_from_config(config: &Config) -> Result<Arc<dyn DatabaseProvider>> {
    match config.database_backend() {
        DatabaseBackend::Postgres => {
            let url = config
                .database_url()
                .context("DATABASE_URL must be set when DATABASE_PROVIDER=postgres")?;
            let provider = PostgresDatabaseProvider::connect(
                url,
                config.db_max_connections(),
                config.db_timeout_seconds(),
            )
            .await
            .context("Failed to connect to database")?;
            Ok(Arc::new(provider))
        }
        DatabaseBackend::Memory => {
            tracing::warn!("Using in-memory database provider; data is lost on restart");
            Ok(Arc::new(MemoryDatabaseProvider::new()))
        }
    }
}

fn payment_from_config(
    config: &Config,
    client: reqwest::Client,
) -> Result<Arc<dyn PaymentProvider>> {
    let selection = config.payment_selection();
    match selection.backend {
        PaymentBackend::Stripe => {
            let secret_key = config
                .stripe_secret_key()
                .context("STRIPE_SECRET_KEY is required for the Stripe payment provider")?;
            let webhook_secret = config
                .stripe_webhook_secret()
                .context("STRIPE_WEBHOOK_SECRET is required for the Stripe payment provider")?;
            tracing::info!(
                payment_provider = %selection.backend,
                reason = %selection.reason,
                "Payment provider selected"
            );
            Ok(Arc::new(StripePaymentProvider::new(
                client,
                secret_key,
                webhook_secret,
            )))
        }
        PaymentBackend::Mock => {
            if config.is_production() {
                anyhow::bail!(
                    "Mock payment provider cannot be used in production ({})",
                    selection.reason
                );
            }
            tracing::warn!(
                payment_provider = %selection.backend,
                reason = %selection.reason,
                "Payment provider selected; no real payments will be processed"
            );
            Ok(Arc::new(MockPaymentProvider::new()))
        }
    }
}
