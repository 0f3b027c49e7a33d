//! FAQ and support ticket integration tests.
//!
//! Run with: `cargo test -p saaskit-api --test support_test`

mod helpers;

use helpers::{bearer, setup_test_app, TestApp};
use saaskit_core::models::AuthSession;
use serde_json::{json, Value};

async fn create_faq(app: &TestApp, admin: &AuthSession, body: Value) -> Value {
    let response = app
        .client()
        .post("/api/admin/faqs")
        .add_header("Authorization", bearer(admin))
        .json(&body)
        .await;
    assert_eq!(response.status_code(), 201, "{}", response.text());
    response.json::<Value>()
}

async fn seed_faqs(app: &TestApp, admin: &AuthSession) {
    for body in [
        json!({ "question": "How do I reset my password?", "answer": "Use the forgot password link.", "category": "account", "order_index": 2 }),
        json!({ "question": "Can I change my email?", "answer": "Yes, from the profile page. Your password stays the same.", "category": "account", "order_index": 1 }),
        json!({ "question": "Which cards do you accept?", "answer": "All major credit cards.", "category": "billing" }),
    ] {
        create_faq(app, admin, body).await;
    }
}

#[tokio::test]
async fn test_faqs_are_ordered_by_category_and_position() {
    let app = setup_test_app().await;
    let admin = app.admin("admin@example.com").await;
    seed_faqs(&app, &admin).await;

    let response = app.client().get("/api/faqs").await;
    assert_eq!(response.status_code(), 200);
    let faqs: Value = response.json();
    let questions: Vec<&str> = faqs
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["question"].as_str().unwrap())
        .collect();
    assert_eq!(
        questions,
        vec![
            "Can I change my email?",
            "How do I reset my password?",
            "Which cards do you accept?"
        ]
    );

    let response = app
        .client()
        .get("/api/faqs")
        .add_query_param("category", "billing")
        .await;
    assert_eq!(response.json::<Value>().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_faq_categories_are_distinct_and_sorted() {
    let app = setup_test_app().await;
    let admin = app.admin("admin@example.com").await;
    seed_faqs(&app, &admin).await;

    let response = app.client().get("/api/faqs/categories").await;

    assert_eq!(response.json::<Value>(), json!(["account", "billing"]));
}

#[tokio::test]
async fn test_faq_search_ranks_question_matches_first() {
    let app = setup_test_app().await;
    let admin = app.admin("admin@example.com").await;
    seed_faqs(&app, &admin).await;

    let response = app
        .client()
        .get("/api/faqs/search")
        .add_query_param("q", "Password")
        .await;

    assert_eq!(response.status_code(), 200);
    let results: Value = response.json();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(
        results[0]["entry"]["question"],
        "How do I reset my password?"
    );
    assert!(results[0]["relevance"].as_u64() > results[1]["relevance"].as_u64());
}

#[tokio::test]
async fn test_blank_search_returns_everything() {
    let app = setup_test_app().await;
    let admin = app.admin("admin@example.com").await;
    seed_faqs(&app, &admin).await;

    let response = app
        .client()
        .get("/api/faqs/search")
        .add_query_param("q", "  ")
        .await;

    let results: Value = response.json();
    assert_eq!(results.as_array().unwrap().len(), 3);
    assert!(results
        .as_array()
        .unwrap()
        .iter()
        .all(|r| r["relevance"] == 1));
}

#[tokio::test]
async fn test_faq_admin_update_and_delete() {
    let app = setup_test_app().await;
    let client = app.client();
    let admin = app.admin("admin@example.com").await;
    let user = app.user("user@example.com").await;

    let faq = create_faq(
        &app,
        &admin,
        json!({ "question": "Old?", "answer": "Old.", "category": "misc" }),
    )
    .await;
    assert_eq!(faq["created_by"], admin.user.id.to_string());
    let path = format!("/api/admin/faqs/{}", faq["id"].as_str().unwrap());

    let response = client
        .put(&path)
        .add_header("Authorization", bearer(&user))
        .json(&json!({ "question": "Hijacked?" }))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = client
        .put(&path)
        .add_header("Authorization", bearer(&admin))
        .json(&json!({ "question": "New?" }))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["question"], "New?");

    let response = client
        .delete(&path)
        .add_header("Authorization", bearer(&admin))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = client.get("/api/faqs").await;
    assert_eq!(response.json::<Value>(), json!([]));
}

#[tokio::test]
async fn test_ticket_lifecycle() {
    let app = setup_test_app().await;
    let client = app.client();
    let admin = app.admin("admin@example.com").await;
    let user = app.user("user@example.com").await;
    let other = app.user("other@example.com").await;

    let response = client
        .post("/api/support/tickets")
        .add_header("Authorization", bearer(&user))
        .json(&json!({ "subject": "Billing", "message": "I was charged twice" }))
        .await;
    assert_eq!(response.status_code(), 201);
    let ticket: Value = response.json();
    assert_eq!(ticket["status"], "open");
    assert_eq!(ticket["user_id"], user.user.id.to_string());

    // Tickets are private to their author
    let response = client
        .get("/api/support/tickets")
        .add_header("Authorization", bearer(&other))
        .await;
    assert_eq!(response.json::<Value>(), json!([]));

    let response = client
        .get("/api/admin/support/tickets")
        .add_header("Authorization", bearer(&admin))
        .await;
    assert_eq!(response.json::<Value>().as_array().unwrap().len(), 1);

    // Answering without a status moves the ticket to in_progress
    let response = client
        .put(&format!(
            "/api/admin/support/tickets/{}",
            ticket["id"].as_str().unwrap()
        ))
        .add_header("Authorization", bearer(&admin))
        .json(&json!({ "response": "Refund issued" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let updated: Value = response.json();
    assert_eq!(updated["status"], "in_progress");
    assert_eq!(updated["response"], "Refund issued");
    assert!(updated["responded_at"].is_string());

    let response = client
        .get("/api/support/tickets")
        .add_header("Authorization", bearer(&user))
        .await;
    assert_eq!(response.json::<Value>()[0]["status"], "in_progress");
}

#[tokio::test]
async fn test_ticket_requires_subject() {
    let app = setup_test_app().await;
    let user = app.user("user@example.com").await;

    let response = app
        .client()
        .post("/api/support/tickets")
        .add_header("Authorization", bearer(&user))
        .json(&json!({ "subject": "", "message": "Help" }))
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_admin_ticket_list_is_forbidden_for_users() {
    let app = setup_test_app().await;
    let user = app.user("user@example.com").await;

    let response = app
        .client()
        .get("/api/admin/support/tickets")
        .add_header("Authorization", bearer(&user))
        .await;

    assert_eq!(response.status_code(), 403);
}
