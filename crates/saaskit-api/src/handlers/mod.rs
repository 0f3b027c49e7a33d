pub mod auth;
pub mod notifications;
pub mod payments;
pub mod subscriptions;
pub mod support;
pub mod users;

use serde::Serialize;
use utoipa::ToSchema;

/// `{"success": true}` acknowledgement body
#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
