//! Domain route groups (auth, users, subscriptions, payments, support, notifications).

use crate::handlers::{auth, notifications, payments, subscriptions, support, users};
use crate::state::AppState;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;

pub fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/signup", post(auth::sign_up))
        .route("/api/auth/signin", post(auth::sign_in))
        .route("/api/auth/signout", post(auth::sign_out))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/reset-password", post(auth::reset_password))
        .route("/api/auth/oauth/{provider}", get(auth::oauth_url))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/mfa/enroll", post(auth::enroll_mfa))
        .route("/api/auth/mfa/verify", post(auth::verify_mfa))
        .route("/api/auth/mfa/factors", get(auth::list_mfa_factors))
        .route("/api/auth/mfa/factors/{id}", delete(auth::unenroll_mfa))
}

pub fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/me/profile",
            get(users::my_profile).put(users::update_my_profile),
        )
        .route(
            "/api/admin/users",
            get(users::list_users).post(users::create_user),
        )
        .route(
            "/api/admin/users/{id}",
            get(users::get_user).delete(users::delete_user),
        )
        .route("/api/admin/users/{id}/role", put(users::set_user_role))
}

pub fn subscription_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/subscriptions/types",
            get(subscriptions::list_subscription_types),
        )
        .route(
            "/api/subscriptions/{id}/usage",
            post(subscriptions::record_usage),
        )
        .route("/api/me/subscriptions", get(subscriptions::my_subscriptions))
        .route("/api/me/features/{flag}", get(subscriptions::my_feature))
        .route("/api/me/quotas/{feature}", get(subscriptions::my_quota))
        .route(
            "/api/admin/subscription-types",
            post(subscriptions::create_subscription_type),
        )
        .route(
            "/api/admin/subscription-types/{id}",
            put(subscriptions::update_subscription_type),
        )
        .route(
            "/api/admin/subscriptions",
            post(subscriptions::create_subscription),
        )
        .route(
            "/api/admin/subscriptions/{id}",
            delete(subscriptions::cancel_subscription),
        )
}

pub fn payment_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/payments/webhook", post(payments::webhook))
        .route("/api/payments/checkout", post(payments::checkout))
        .route("/api/payments/portal", post(payments::portal))
}

pub fn support_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/faqs", get(support::list_faqs))
        .route("/api/faqs/search", get(support::search_faqs))
        .route("/api/faqs/categories", get(support::faq_categories))
        .route("/api/admin/faqs", post(support::create_faq))
        .route(
            "/api/admin/faqs/{id}",
            put(support::update_faq).delete(support::delete_faq),
        )
        .route(
            "/api/support/tickets",
            get(support::my_tickets).post(support::create_ticket),
        )
        .route("/api/admin/support/tickets", get(support::all_tickets))
        .route(
            "/api/admin/support/tickets/{id}",
            put(support::update_ticket),
        )
}

pub fn notification_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/admin/notifications",
            get(notifications::list_notification_types)
                .post(notifications::create_notification_type),
        )
        .route(
            "/api/admin/notifications/{id}",
            get(notifications::get_notification_type)
                .put(notifications::update_notification_type)
                .delete(notifications::delete_notification_type),
        )
        .route(
            "/api/user/notification-preferences",
            get(notifications::get_preferences).post(notifications::set_preference),
        )
}
