//! Auth API integration tests.
//!
//! Run with: `cargo test -p saaskit-api --test auth_test`

mod helpers;

use helpers::{bearer, setup_test_app, TEST_PASSWORD};
use serde_json::{json, Value};

#[tokio::test]
async fn test_signup_then_signin_returns_tokens() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client
        .post("/api/auth/signup")
        .json(&json!({
            "email": "new@example.com",
            "password": TEST_PASSWORD,
            "firstName": "Ada"
        }))
        .await;
    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    assert_eq!(body["user"]["email"], "new@example.com");
    assert_eq!(body["user"]["role"], "user");

    let response = client
        .post("/api/auth/signin")
        .json(&json!({ "email": "new@example.com", "password": TEST_PASSWORD }))
        .await;
    assert_eq!(response.status_code(), 200);
    let session: Value = response.json();
    assert!(session["access_token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(session["refresh_token"].is_string());
}

#[tokio::test]
async fn test_signup_rejects_weak_password() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/api/auth/signup")
        .json(&json!({ "email": "weak@example.com", "password": "password" }))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_signin_with_wrong_password_fails() {
    let app = setup_test_app().await;
    app.user("jane@example.com").await;

    let response = app
        .client()
        .post("/api/auth/signin")
        .json(&json!({ "email": "jane@example.com", "password": "Wrong1234" }))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "AUTH_ERROR");
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/api/auth/signin")
        .content_type("application/json")
        .text("{not json")
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_me_requires_bearer_token() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client.get("/api/auth/me").await;
    assert_eq!(response.status_code(), 401);

    let response = client
        .get("/api/auth/me")
        .add_header("Authorization", "Bearer not-a-token")
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_me_returns_current_user() {
    let app = setup_test_app().await;
    let session = app.user("me@example.com").await;

    let response = app
        .client()
        .get("/api/auth/me")
        .add_header("Authorization", bearer(&session))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["user"]["id"], session.user.id.to_string());
}

#[tokio::test]
async fn test_signout_invalidates_token() {
    let app = setup_test_app().await;
    let client = app.client();
    let session = app.user("out@example.com").await;

    let response = client
        .post("/api/auth/signout")
        .add_header("Authorization", bearer(&session))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["success"], true);

    let response = client
        .get("/api/auth/me")
        .add_header("Authorization", bearer(&session))
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_refresh_rotates_session() {
    let app = setup_test_app().await;
    let client = app.client();
    let session = app.user("refresh@example.com").await;
    let refresh_token = session.refresh_token.clone().unwrap();

    let response = client
        .post("/api/auth/refresh")
        .json(&json!({ "refreshToken": refresh_token }))
        .await;
    assert_eq!(response.status_code(), 200);
    let renewed: Value = response.json();
    assert_ne!(renewed["access_token"], session.access_token);

    // Refresh tokens are single use
    let response = client
        .post("/api/auth/refresh")
        .json(&json!({ "refreshToken": refresh_token }))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_reset_password_is_forwarded() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/api/auth/reset-password")
        .json(&json!({ "email": "forgot@example.com" }))
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(app.auth.password_resets().await, vec!["forgot@example.com"]);
}

#[tokio::test]
async fn test_oauth_url_for_known_and_unknown_provider() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client
        .get("/api/auth/oauth/google")
        .add_query_param("redirectTo", "http://localhost:3000/done")
        .await;
    assert_eq!(response.status_code(), 200);
    let url = response.json::<Value>()["url"].as_str().unwrap().to_string();
    assert!(url.contains("provider=google"));

    let response = client.get("/api/auth/oauth/myspace").await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_mfa_enroll_verify_and_unenroll() {
    let app = setup_test_app().await;
    let client = app.client();
    let session = app.user("mfa@example.com").await;

    let response = client
        .post("/api/auth/mfa/enroll")
        .add_header("Authorization", bearer(&session))
        .json(&json!({ "friendlyName": "phone" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let enrollment: Value = response.json();
    let factor_id = enrollment["id"].as_str().unwrap().to_string();
    assert!(enrollment["totp"]["secret"].is_string());

    let response = client
        .post("/api/auth/mfa/verify")
        .add_header("Authorization", bearer(&session))
        .json(&json!({ "factor_id": factor_id, "code": "123456" }))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = client
        .get("/api/auth/mfa/factors")
        .add_header("Authorization", bearer(&session))
        .await;
    let factors: Value = response.json();
    assert_eq!(factors["factors"][0]["status"], "verified");
    assert_eq!(factors["factors"][0]["friendly_name"], "phone");

    let response = client
        .delete(&format!("/api/auth/mfa/factors/{}", factor_id))
        .add_header("Authorization", bearer(&session))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = client
        .get("/api/auth/mfa/factors")
        .add_header("Authorization", bearer(&session))
        .await;
    assert_eq!(response.json::<Value>()["factors"], json!([]));
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get("/live")
        .add_header("X-Request-ID", "trace-me")
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.header("x-request-id"), "trace-me");
}
