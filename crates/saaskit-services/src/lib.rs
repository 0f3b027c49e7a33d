//! SaasKit Services Layer
//!
//! Business services (subscriptions, support, notifications, billing, user
//! management) and the external providers they sit on: Supabase auth and
//! Stripe payments. The API crate depends on this crate only through the
//! [`Providers`] bundle and the service types re-exported here; keep HTTP
//! handling in saaskit-api.

pub mod providers;
pub mod services;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use providers::{
    resolve_role, verify_webhook_signature, AuthProvider, MockPaymentProvider, PaymentProvider,
    Providers, ProvidersBuilder, SessionEvent, StripePaymentProvider, SupabaseAuthProvider,
};
pub use services::permissions::Permission;
pub use services::{
    AuthService, BillingService, NotificationService, PermissionsService, SubscriptionService,
    SupportService, UserManagementService,
};
