pub mod auth;
pub mod billing;
pub mod notifications;
pub mod permissions;
pub mod subscriptions;
pub mod support;
pub mod user_management;

pub use auth::AuthService;
pub use billing::BillingService;
pub use notifications::NotificationService;
pub use permissions::PermissionsService;
pub use subscriptions::SubscriptionService;
pub use support::SupportService;
pub use user_management::UserManagementService;

use serde_json::{Map, Value};

/// Equality filter map from column/value pairs
pub(crate) fn filters<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(column, value)| (column.to_string(), value))
        .collect()
}

/// Stamp `updated_at` on a row before an update
pub(crate) fn touch(row: &mut Value) {
    if let Value::Object(map) = row {
        map.insert(
            "updated_at".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
    }
}
