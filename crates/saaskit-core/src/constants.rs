//! Shared constants: roles, table names and fixed values used across crates.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";
pub const ROLE_GUEST: &str = "guest";

pub const DEFAULT_USER_ROLE: &str = ROLE_USER;

/// Role given to a user attached to a subscription
pub const SUBSCRIPTION_OWNER_ROLE: &str = "subscription_owner";

pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const USER_PROFILES: &str = "user_profiles";
    pub const USER_PROFILES_VIEW: &str = "user_profiles_view";
    pub const SUBSCRIPTION_TYPES: &str = "subscription_types";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const SUBSCRIPTION_USERS: &str = "subscription_users";
    pub const SUBSCRIPTION_CONSUMPTION: &str = "subscription_consumption";
    pub const NOTIFICATION_TYPES: &str = "notification_types";
    pub const NOTIFICATION_PREFERENCES: &str = "notification_preferences";
    pub const SUPPORT_TICKETS: &str = "support_tickets";
    pub const FAQ_ENTRIES: &str = "faq_entries";
    pub const PAYMENT_CUSTOMERS: &str = "payment_customers";
}

/// Default page size for paginated listings
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Upper bound on page size accepted from clients
pub const MAX_PAGE_SIZE: u32 = 100;

/// Maximum accepted age of a signed webhook timestamp
pub const WEBHOOK_TOLERANCE_SECS: u64 = 300;

/// Upper bound for any request body, webhook payloads included
pub const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;
