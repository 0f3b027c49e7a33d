//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p saaskit-api`. Every test app runs on
//! the in-memory database with an in-memory auth provider, so no external
//! services are needed.

#![allow(dead_code)]

use axum_test::TestServer;
use saaskit_api::setup_routes;
use saaskit_api::state::AppState;
use saaskit_core::config::{BaseConfig, SaasConfig};
use saaskit_core::models::AuthSession;
use saaskit_core::{Config, DatabaseBackend, PaymentBackend};
use saaskit_db::MemoryDatabaseProvider;
use saaskit_services::testing::{InMemoryAuthProvider, RecordingPaymentProvider};
use saaskit_services::{PaymentProvider, Providers};
use serde_json::{json, Value};
use std::sync::Arc;

pub const TEST_PASSWORD: &str = "Passw0rd!";
pub const APP_URL: &str = "http://localhost:3000";

/// Test application: server plus handles on the in-memory providers.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub auth: InMemoryAuthProvider,
    pub payments: RecordingPaymentProvider,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Account with the `user` role, already signed in.
    pub async fn user(&self, email: &str) -> AuthSession {
        self.auth.seed_user(email, TEST_PASSWORD, "user").await
    }

    /// Account with the `admin` role, already signed in.
    pub async fn admin(&self, email: &str) -> AuthSession {
        self.auth.seed_user(email, TEST_PASSWORD, "admin").await
    }
}

pub fn test_config() -> Config {
    Config::new(SaasConfig {
        base: BaseConfig {
            server_port: 0,
            cors_origins: vec!["*".to_string()],
            environment: "test".to_string(),
            http_client_timeout_secs: 5,
        },
        database_backend: DatabaseBackend::Memory,
        database_url: None,
        db_max_connections: 1,
        db_timeout_seconds: 1,
        supabase_url: "http://127.0.0.1:9".to_string(),
        supabase_anon_key: "anon".to_string(),
        stripe_secret_key: None,
        stripe_webhook_secret: None,
        payment_provider: Some(PaymentBackend::Mock),
        app_url: APP_URL.to_string(),
    })
}

/// Setup test app with a recording mock payment provider.
pub async fn setup_test_app() -> TestApp {
    let payments = RecordingPaymentProvider::new();
    build_app(Arc::new(payments.clone()), payments).await
}

/// Setup test app with a specific payment provider (e.g. Stripe against a
/// local webhook secret).
pub async fn setup_test_app_with_payment(payment: Arc<dyn PaymentProvider>) -> TestApp {
    build_app(payment, RecordingPaymentProvider::new()).await
}

async fn build_app(
    payment: Arc<dyn PaymentProvider>,
    payments: RecordingPaymentProvider,
) -> TestApp {
    let config = test_config();
    let auth = InMemoryAuthProvider::new();

    let providers = Providers::builder(&config)
        .with_database(Arc::new(MemoryDatabaseProvider::new()))
        .with_auth(Arc::new(auth.clone()))
        .with_payment(payment)
        .build()
        .await
        .expect("Failed to build test providers");

    let state = Arc::new(AppState::new(config.clone(), providers));
    let router = setup_routes(&config, state.clone()).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        state,
        auth,
        payments,
    }
}

/// `Authorization` header value for a session
pub fn bearer(session: &AuthSession) -> String {
    format!("Bearer {}", session.access_token)
}

/// Create a subscription type through the admin API and return its JSON.
pub async fn create_plan(app: &TestApp, admin: &AuthSession, body: Value) -> Value {
    let response = app
        .client()
        .post("/api/admin/subscription-types")
        .add_header("Authorization", bearer(admin))
        .json(&body)
        .await;
    assert_eq!(response.status_code(), 201, "{}", response.text());
    response.json::<Value>()
}

/// Subscribe `user_id` to `plan_id` through the admin API and return the subscription JSON.
pub async fn subscribe(app: &TestApp, admin: &AuthSession, plan_id: &str, user_id: &str) -> Value {
    let response = app
        .client()
        .post("/api/admin/subscriptions")
        .add_header("Authorization", bearer(admin))
        .json(&json!({ "subscription_type_id": plan_id, "user_id": user_id }))
        .await;
    assert_eq!(response.status_code(), 201, "{}", response.text());
    response.json::<Value>()
}
