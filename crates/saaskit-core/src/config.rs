//! Configuration module
//!
//! This module provides the configuration structures for the API and the provider
//! bundle: database, Supabase auth, Stripe payments and service-level settings.

use std::env;
use std::fmt;

// Common constants
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const HTTP_CLIENT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_APP_URL: &str = "http://localhost:3000";

/// Stripe key value shipped in example env files. Never talks to Stripe.
pub const PLACEHOLDER_STRIPE_KEY: &str = "sk_test_mock_key";

/// Which database provider backs the service
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatabaseBackend {
    Postgres,
    Memory,
}

/// Which payment provider backs the service
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentBackend {
    Stripe,
    Mock,
}

impl fmt::Display for PaymentBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentBackend::Stripe => write!(f, "stripe"),
            PaymentBackend::Mock => write!(f, "mock"),
        }
    }
}

/// Resolved payment backend together with the reason it was chosen.
/// Logged at startup so operators can see when the mock provider is active.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentSelection {
    pub backend: PaymentBackend,
    pub reason: String,
}

/// Decide the payment backend from the explicit `PAYMENT_PROVIDER` value and the
/// Stripe credentials that are present.
pub fn resolve_payment_backend(
    explicit: Option<PaymentBackend>,
    stripe_secret_key: Option<&str>,
    stripe_webhook_secret: Option<&str>,
) -> PaymentSelection {
    match explicit {
        Some(PaymentBackend::Stripe) => PaymentSelection {
            backend: PaymentBackend::Stripe,
            reason: "PAYMENT_PROVIDER=stripe".to_string(),
        },
        Some(PaymentBackend::Mock) => PaymentSelection {
            backend: PaymentBackend::Mock,
            reason: "PAYMENT_PROVIDER=mock".to_string(),
        },
        None => {
            let key_usable = stripe_secret_key
                .map(|k| !k.is_empty() && k != PLACEHOLDER_STRIPE_KEY)
                .unwrap_or(false);
            let secret_present = stripe_webhook_secret
                .map(|s| !s.is_empty())
                .unwrap_or(false);
            if key_usable && secret_present {
                PaymentSelection {
                    backend: PaymentBackend::Stripe,
                    reason: "Stripe credentials present".to_string(),
                }
            } else {
                PaymentSelection {
                    backend: PaymentBackend::Mock,
                    reason: "STRIPE_SECRET_KEY or STRIPE_WEBHOOK_SECRET missing or placeholder"
                        .to_string(),
                }
            }
        }
    }
}

/// Base configuration shared by the server and the providers
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub http_client_timeout_secs: u64,
}

/// Full service configuration
#[derive(Clone, Debug)]
pub struct SaasConfig {
    pub base: BaseConfig,
    pub database_backend: DatabaseBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    // Supabase auth
    pub supabase_url: String,
    pub supabase_anon_key: String,
    // Stripe payments
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub payment_provider: Option<PaymentBackend>,
    // Base URL used for OAuth redirects and checkout return URLs
    pub app_url: String,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<SaasConfig>);

impl Config {
    fn inner(&self) -> &SaasConfig {
        &self.0
    }

    pub fn new(config: SaasConfig) -> Self {
        Config(Box::new(config))
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.inner().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = SaasConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn http_client_timeout_secs(&self) -> u64 {
        self.inner().base.http_client_timeout_secs
    }

    pub fn database_backend(&self) -> DatabaseBackend {
        self.inner().database_backend
    }

    pub fn database_url(&self) -> Option<&str> {
        self.inner().database_url.as_deref()
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().db_timeout_seconds
    }

    pub fn supabase_url(&self) -> &str {
        &self.inner().supabase_url
    }

    pub fn supabase_anon_key(&self) -> &str {
        &self.inner().supabase_anon_key
    }

    pub fn stripe_secret_key(&self) -> Option<&str> {
        self.inner().stripe_secret_key.as_deref()
    }

    pub fn stripe_webhook_secret(&self) -> Option<&str> {
        self.inner().stripe_webhook_secret.as_deref()
    }

    pub fn app_url(&self) -> &str {
        &self.inner().app_url
    }

    /// Payment backend decision for this configuration
    pub fn payment_selection(&self) -> PaymentSelection {
        resolve_payment_backend(
            self.inner().payment_provider,
            self.stripe_secret_key(),
            self.stripe_webhook_secret(),
        )
    }
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

/// Read a variable, also accepting the `NEXT_PUBLIC_`-prefixed name used by
/// frontend env files that are often shared with the backend.
fn env_with_public_fallback(name: &str) -> Option<String> {
    env::var(name)
        .or_else(|_| env::var(format!("NEXT_PUBLIC_{}", name)))
        .ok()
        .filter(|s| !s.trim().is_empty())
}

impl SaasConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        if is_production_env(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            environment,
            http_client_timeout_secs: env::var("HTTP_CLIENT_TIMEOUT_SECS")
                .unwrap_or_else(|_| HTTP_CLIENT_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(HTTP_CLIENT_TIMEOUT_SECS),
        };

        let database_backend = match env::var("DATABASE_PROVIDER")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "memory" => DatabaseBackend::Memory,
            other => {
                return Err(anyhow::anyhow!(
                    "DATABASE_PROVIDER must be 'postgres' or 'memory', got '{}'",
                    other
                ))
            }
        };

        let payment_provider = match env::var("PAYMENT_PROVIDER").ok() {
            None => None,
            Some(value) => match value.trim().to_lowercase().as_str() {
                "" => None,
                "stripe" => Some(PaymentBackend::Stripe),
                "mock" => Some(PaymentBackend::Mock),
                other => {
                    return Err(anyhow::anyhow!(
                        "PAYMENT_PROVIDER must be 'stripe' or 'mock', got '{}'",
                        other
                    ))
                }
            },
        };

        let config = SaasConfig {
            base,
            database_backend,
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            supabase_url: env_with_public_fallback("SUPABASE_URL").unwrap_or_default(),
            supabase_anon_key: env_with_public_fallback("SUPABASE_ANON_KEY").unwrap_or_default(),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").ok().filter(|s| !s.is_empty()),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            payment_provider,
            app_url: env_with_public_fallback("APP_URL")
                .unwrap_or_else(|| DEFAULT_APP_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.database_backend == DatabaseBackend::Postgres {
            match self.database_url.as_deref() {
                None => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be set when DATABASE_PROVIDER=postgres"
                    ))
                }
                Some(url) if !(url.starts_with("postgresql://") || url.starts_with("postgres://")) => {
                    return Err(anyhow::anyhow!(
                        "DATABASE_URL must be a valid PostgreSQL connection string"
                    ))
                }
                Some(_) => {}
            }
        }

        if self.supabase_url.is_empty() || self.supabase_anon_key.is_empty() {
            return Err(anyhow::anyhow!(
                "SUPABASE_URL and SUPABASE_ANON_KEY must be set for authentication"
            ));
        }

        if !(self.app_url.starts_with("http://") || self.app_url.starts_with("https://")) {
            return Err(anyhow::anyhow!("APP_URL must be an http(s) URL"));
        }

        let selection = resolve_payment_backend(
            self.payment_provider,
            self.stripe_secret_key.as_deref(),
            self.stripe_webhook_secret.as_deref(),
        );
        match selection.backend {
            PaymentBackend::Stripe => {
                if self.stripe_secret_key.is_none() || self.stripe_webhook_secret.is_none() {
                    return Err(anyhow::anyhow!(
                        "PAYMENT_PROVIDER=stripe requires STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET"
                    ));
                }
            }
            PaymentBackend::Mock => {
                if is_production_env(&self.base.environment) {
                    return Err(anyhow::anyhow!(
                        "Mock payment provider cannot be used in production ({})",
                        selection.reason
                    ));
                }
            }
        }

        Ok(())
    }
}
