//! Subscription, feature flag and quota integration tests.
//!
//! Run with: `cargo test -p saaskit-api --test subscriptions_test`

mod helpers;

use helpers::{bearer, create_plan, setup_test_app, subscribe};
use serde_json::{json, Value};

#[tokio::test]
async fn test_list_subscription_types_is_public() {
    let app = setup_test_app().await;
    let admin = app.admin("admin@example.com").await;
    create_plan(&app, &admin, json!({ "name": "Basic", "price_monthly": 9.0 })).await;

    let response = app.client().get("/api/subscriptions/types").await;

    assert_eq!(response.status_code(), 200);
    let plans: Value = response.json();
    assert_eq!(plans.as_array().unwrap().len(), 1);
    assert_eq!(plans[0]["name"], "Basic");
}

#[tokio::test]
async fn test_creating_plans_requires_admin() {
    let app = setup_test_app().await;
    let user = app.user("user@example.com").await;

    let response = app
        .client()
        .post("/api/admin/subscription-types")
        .add_header("Authorization", bearer(&user))
        .json(&json!({ "name": "Sneaky" }))
        .await;

    assert_eq!(response.status_code(), 403);
    assert_eq!(response.json::<Value>()["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_feature_flags_follow_active_subscriptions() {
    let app = setup_test_app().await;
    let client = app.client();
    let admin = app.admin("admin@example.com").await;
    let user = app.user("user@example.com").await;

    let plan = create_plan(
        &app,
        &admin,
        json!({ "name": "Pro", "feature_flags": { "api_access": true, "sso": false } }),
    )
    .await;

    let response = client
        .get("/api/me/features/api_access")
        .add_header("Authorization", bearer(&user))
        .await;
    assert_eq!(response.json::<Value>()["enabled"], false);

    let subscription = subscribe(
        &app,
        &admin,
        plan["id"].as_str().unwrap(),
        &user.user.id.to_string(),
    )
    .await;
    assert_eq!(subscription["status"], "active");

    let response = client
        .get("/api/me/features/api_access")
        .add_header("Authorization", bearer(&user))
        .await;
    assert_eq!(response.json::<Value>()["enabled"], true);

    let response = client
        .get("/api/me/features/sso")
        .add_header("Authorization", bearer(&user))
        .await;
    assert_eq!(response.json::<Value>()["enabled"], false);

    // Cancelled subscriptions no longer grant anything
    let response = client
        .delete(&format!(
            "/api/admin/subscriptions/{}",
            subscription["id"].as_str().unwrap()
        ))
        .add_header("Authorization", bearer(&admin))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["status"], "cancelled");

    let response = client
        .get("/api/me/features/api_access")
        .add_header("Authorization", bearer(&user))
        .await;
    assert_eq!(response.json::<Value>()["enabled"], false);
}

#[tokio::test]
async fn test_my_subscriptions_lists_plan_and_role() {
    let app = setup_test_app().await;
    let admin = app.admin("admin@example.com").await;
    let user = app.user("user@example.com").await;
    let plan = create_plan(&app, &admin, json!({ "name": "Team" })).await;
    subscribe(&app, &admin, plan["id"].as_str().unwrap(), &user.user.id.to_string()).await;

    let response = app
        .client()
        .get("/api/me/subscriptions")
        .add_header("Authorization", bearer(&user))
        .await;

    assert_eq!(response.status_code(), 200);
    let subscriptions: Value = response.json();
    assert_eq!(subscriptions[0]["subscription_type"]["name"], "Team");
    assert_eq!(subscriptions[0]["role"], "subscription_owner");
}

#[tokio::test]
async fn test_quota_uses_largest_limit_and_summed_usage() {
    let app = setup_test_app().await;
    let client = app.client();
    let admin = app.admin("admin@example.com").await;
    let user = app.user("user@example.com").await;
    let user_id = user.user.id.to_string();

    let small = create_plan(
        &app,
        &admin,
        json!({ "name": "Small", "quota_limits": { "api_calls": 100 } }),
    )
    .await;
    let large = create_plan(
        &app,
        &admin,
        json!({ "name": "Large", "quota_limits": { "api_calls": 500 } }),
    )
    .await;
    let first = subscribe(&app, &admin, small["id"].as_str().unwrap(), &user_id).await;
    let second = subscribe(&app, &admin, large["id"].as_str().unwrap(), &user_id).await;

    let response = client
        .get("/api/me/quotas/api_calls")
        .add_header("Authorization", bearer(&user))
        .await;
    let quota: Value = response.json();
    assert_eq!(quota["limit"], 500);
    assert_eq!(quota["exceeded"], false);

    for (subscription, amount) in [(&first, 300), (&second, 250)] {
        let response = client
            .post(&format!(
                "/api/subscriptions/{}/usage",
                subscription["id"].as_str().unwrap()
            ))
            .add_header("Authorization", bearer(&user))
            .json(&json!({ "feature": "api_calls", "amount": amount }))
            .await;
        assert_eq!(response.status_code(), 200, "{}", response.text());
        assert_eq!(response.json::<Value>()["usage"], amount);
    }

    let response = client
        .get("/api/me/quotas/api_calls")
        .add_header("Authorization", bearer(&user))
        .await;
    let quota: Value = response.json();
    assert_eq!(quota["limit"], 500);
    assert_eq!(quota["exceeded"], true);
}

#[tokio::test]
async fn test_feature_without_limit_is_unlimited() {
    let app = setup_test_app().await;
    let admin = app.admin("admin@example.com").await;
    let user = app.user("user@example.com").await;
    let plan = create_plan(&app, &admin, json!({ "name": "Free" })).await;
    subscribe(&app, &admin, plan["id"].as_str().unwrap(), &user.user.id.to_string()).await;

    let response = app
        .client()
        .get("/api/me/quotas/storage_gb")
        .add_header("Authorization", bearer(&user))
        .await;

    let quota: Value = response.json();
    assert!(quota["limit"].is_null());
    assert_eq!(quota["exceeded"], false);
}

#[tokio::test]
async fn test_usage_accumulates_per_month() {
    let app = setup_test_app().await;
    let client = app.client();
    let admin = app.admin("admin@example.com").await;
    let user = app.user("user@example.com").await;
    let plan = create_plan(&app, &admin, json!({ "name": "Metered" })).await;
    let subscription =
        subscribe(&app, &admin, plan["id"].as_str().unwrap(), &user.user.id.to_string()).await;
    let path = format!(
        "/api/subscriptions/{}/usage",
        subscription["id"].as_str().unwrap()
    );

    // Amount defaults to one
    let response = client
        .post(&path)
        .add_header("Authorization", bearer(&user))
        .json(&json!({ "feature": "exports", "month": "2024-01" }))
        .await;
    assert_eq!(response.json::<Value>()["usage"], 1);

    let response = client
        .post(&path)
        .add_header("Authorization", bearer(&user))
        .json(&json!({ "feature": "exports", "amount": 4, "month": "2024-01" }))
        .await;
    let usage: Value = response.json();
    assert_eq!(usage["usage"], 5);
    assert_eq!(usage["month"], "2024-01-01");

    let response = client
        .post(&path)
        .add_header("Authorization", bearer(&user))
        .json(&json!({ "feature": "exports", "amount": 2, "month": "2024-02" }))
        .await;
    assert_eq!(response.json::<Value>()["usage"], 2);
}

#[tokio::test]
async fn test_usage_rejects_non_positive_amount_and_outsiders() {
    let app = setup_test_app().await;
    let client = app.client();
    let admin = app.admin("admin@example.com").await;
    let member = app.user("member@example.com").await;
    let outsider = app.user("outsider@example.com").await;
    let plan = create_plan(&app, &admin, json!({ "name": "Private" })).await;
    let subscription =
        subscribe(&app, &admin, plan["id"].as_str().unwrap(), &member.user.id.to_string()).await;
    let path = format!(
        "/api/subscriptions/{}/usage",
        subscription["id"].as_str().unwrap()
    );

    let response = client
        .post(&path)
        .add_header("Authorization", bearer(&member))
        .json(&json!({ "feature": "exports", "amount": 0 }))
        .await;
    assert_eq!(response.status_code(), 400);

    let response = client
        .post(&path)
        .add_header("Authorization", bearer(&outsider))
        .json(&json!({ "feature": "exports" }))
        .await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_subscribing_to_unknown_plan_is_not_found() {
    let app = setup_test_app().await;
    let admin = app.admin("admin@example.com").await;

    let response = app
        .client()
        .post("/api/admin/subscriptions")
        .add_header("Authorization", bearer(&admin))
        .json(&json!({
            "subscription_type_id": uuid::Uuid::new_v4(),
            "user_id": admin.user.id
        }))
        .await;

    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_update_subscription_type() {
    let app = setup_test_app().await;
    let admin = app.admin("admin@example.com").await;
    let plan = create_plan(&app, &admin, json!({ "name": "Starter" })).await;

    let response = app
        .client()
        .put(&format!(
            "/api/admin/subscription-types/{}",
            plan["id"].as_str().unwrap()
        ))
        .add_header("Authorization", bearer(&admin))
        .json(&json!({ "description": "For small teams", "price_monthly": 19.0 }))
        .await;

    assert_eq!(response.status_code(), 200);
    let updated: Value = response.json();
    assert_eq!(updated["name"], "Starter");
    assert_eq!(updated["description"], "For small teams");
    assert_eq!(updated["price_monthly"], 19.0);
}
