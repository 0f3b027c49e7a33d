//! OpenAPI documentation, served at `/api/openapi.json` and browsable at `/docs`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use saaskit_core::models;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SaasKit API",
        version = "0.1.0",
        description = "Backend for a subscription SaaS: authentication, plans with feature flags and monthly quotas, billing, support tickets, FAQ search and notification preferences."
    ),
    paths(
        // Auth
        handlers::auth::sign_up,
        handlers::auth::sign_in,
        handlers::auth::sign_out,
        handlers::auth::refresh,
        handlers::auth::reset_password,
        handlers::auth::oauth_url,
        handlers::auth::me,
        handlers::auth::enroll_mfa,
        handlers::auth::verify_mfa,
        handlers::auth::list_mfa_factors,
        handlers::auth::unenroll_mfa,
        // Notifications
        handlers::notifications::list_notification_types,
        handlers::notifications::create_notification_type,
        handlers::notifications::get_notification_type,
        handlers::notifications::update_notification_type,
        handlers::notifications::delete_notification_type,
        handlers::notifications::get_preferences,
        handlers::notifications::set_preference,
        // Subscriptions
        handlers::subscriptions::list_subscription_types,
        handlers::subscriptions::create_subscription_type,
        handlers::subscriptions::update_subscription_type,
        handlers::subscriptions::create_subscription,
        handlers::subscriptions::cancel_subscription,
        handlers::subscriptions::my_subscriptions,
        handlers::subscriptions::my_feature,
        handlers::subscriptions::my_quota,
        handlers::subscriptions::record_usage,
        // Support
        handlers::support::list_faqs,
        handlers::support::search_faqs,
        handlers::support::faq_categories,
        handlers::support::create_faq,
        handlers::support::update_faq,
        handlers::support::delete_faq,
        handlers::support::create_ticket,
        handlers::support::my_tickets,
        handlers::support::all_tickets,
        handlers::support::update_ticket,
        // Users
        handlers::users::my_profile,
        handlers::users::update_my_profile,
        handlers::users::list_users,
        handlers::users::create_user,
        handlers::users::get_user,
        handlers::users::set_user_role,
        handlers::users::delete_user,
        // Payments
        handlers::payments::webhook,
        handlers::payments::checkout,
        handlers::payments::portal,
    ),
    components(
        schemas(
            error::ErrorResponse,
            handlers::SuccessResponse,
            handlers::auth::UserResponse,
            handlers::auth::OAuthUrlResponse,
            handlers::auth::EnrollMfaRequest,
            handlers::auth::MfaFactorsResponse,
            handlers::notifications::NotificationTypesResponse,
            handlers::notifications::NotificationTypeResponse,
            handlers::notifications::PreferencesResponse,
            handlers::notifications::PreferenceResponse,
            handlers::users::SetRoleRequest,
            handlers::payments::WebhookAck,
            models::User,
            models::AuthSession,
            models::UserProfile,
            models::RegisterRequest,
            models::LoginRequest,
            models::RefreshRequest,
            models::PasswordResetRequest,
            models::UpdateProfileRequest,
            models::CreateUserRequest,
            models::OAuthProvider,
            models::MfaEnrollment,
            models::MfaFactor,
            models::MfaFactorStatus,
            models::MfaVerifyParams,
            models::TotpDetails,
            models::NotificationType,
            models::NotificationChannel,
            models::NotificationPreference,
            models::UserNotificationPreference,
            models::CreateNotificationTypeRequest,
            models::UpdateNotificationTypeRequest,
            models::SetNotificationPreferenceRequest,
            models::SubscriptionType,
            models::Subscription,
            models::SubscriptionStatus,
            models::SubscriptionUser,
            models::UserSubscription,
            models::CreateSubscriptionTypeRequest,
            models::UpdateSubscriptionTypeRequest,
            models::CreateSubscriptionRequest,
            models::IncrementUsageRequest,
            models::UsageResponse,
            models::QuotaStatus,
            models::FeatureAccess,
            models::SupportTicket,
            models::TicketStatus,
            models::FaqEntry,
            models::FaqSearchResult,
            models::CreateTicketRequest,
            models::UpdateTicketRequest,
            models::CreateFaqRequest,
            models::UpdateFaqRequest,
            models::BillingInterval,
            models::CheckoutRequest,
            models::CheckoutSession,
            models::PortalRequest,
            models::PortalSession,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Sign up, sign in, sessions and MFA"),
        (name = "notifications", description = "Notification types and user preferences"),
        (name = "subscriptions", description = "Plans, feature flags and usage quotas"),
        (name = "support", description = "FAQ and support tickets"),
        (name = "users", description = "User profiles and administration"),
        (name = "payments", description = "Checkout, billing portal and webhooks"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes_and_security() {
        let spec = ApiDoc::openapi();
        assert!(spec.paths.paths.contains_key("/api/auth/signup"));
        assert!(spec
            .paths
            .paths
            .contains_key("/api/subscriptions/{id}/usage"));
        assert!(spec
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("bearer_auth")));
    }
}
