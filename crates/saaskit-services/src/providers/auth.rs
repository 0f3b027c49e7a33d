//! Authentication provider abstraction.
//!
//! The server is stateless: a session is an [`AuthSession`] held by the caller
//! and every session-bound operation takes its access (or refresh) token.

use async_trait::async_trait;
use saaskit_core::constants::DEFAULT_USER_ROLE;
use saaskit_core::models::{
    AuthSession, MfaEnrollment, MfaFactor, MfaVerifyParams, OAuthProvider, SignInParams,
    SignUpParams, User,
};
use saaskit_core::AppError;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Session lifecycle notification emitted by providers that support it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { user_id: Uuid },
    SignedOut,
    TokenRefreshed { user_id: Uuid },
    UserUpdated { user_id: Uuid },
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, params: SignUpParams) -> Result<User, AppError>;

    async fn sign_in(&self, params: SignInParams) -> Result<AuthSession, AppError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError>;

    /// User behind `access_token`, or `None` when the token is not valid
    async fn get_user(&self, access_token: &str) -> Result<Option<User>, AppError>;

    async fn get_session(&self, access_token: &str) -> Result<Option<AuthSession>, AppError>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, AppError>;

    async fn reset_password(&self, email: &str) -> Result<(), AppError>;

    async fn update_user(
        &self,
        access_token: &str,
        metadata: Map<String, Value>,
    ) -> Result<User, AppError>;

    /// URL the client should be sent to for the provider's consent screen
    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
    ) -> Result<String, AppError>;

    async fn enroll_mfa(
        &self,
        access_token: &str,
        friendly_name: Option<&str>,
    ) -> Result<MfaEnrollment, AppError>;

    /// Verify a TOTP code. A challenge is created first when `challenge_id` is absent.
    async fn verify_mfa(&self, access_token: &str, params: MfaVerifyParams)
        -> Result<(), AppError>;

    async fn unenroll_mfa(&self, access_token: &str, factor_id: &str) -> Result<(), AppError>;

    async fn list_mfa_factors(&self, access_token: &str) -> Result<Vec<MfaFactor>, AppError>;

    /// Subscribe to session lifecycle events, when the provider emits them
    fn session_events(&self) -> Option<broadcast::Receiver<SessionEvent>> {
        None
    }
}

/// Resolve a user's role: profile row, then metadata `role`, then the auth
/// record's own role, then the default role.
pub fn resolve_role(
    profile_role: Option<&str>,
    metadata: &Value,
    auth_role: Option<&str>,
) -> String {
    profile_role
        .filter(|r| !r.is_empty())
        .or_else(|| {
            metadata
                .get("role")
                .and_then(Value::as_str)
                .filter(|r| !r.is_empty())
        })
        .or_else(|| auth_role.filter(|r| !r.is_empty()))
        .unwrap_or(DEFAULT_USER_ROLE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_role_wins() {
        let role = resolve_role(Some("admin"), &json!({"role": "user"}), Some("authenticated"));
        assert_eq!(role, "admin");
    }

    #[test]
    fn test_metadata_role_then_auth_role() {
        assert_eq!(
            resolve_role(None, &json!({"role": "guest"}), Some("authenticated")),
            "guest"
        );
        assert_eq!(
            resolve_role(None, &json!({}), Some("authenticated")),
            "authenticated"
        );
    }

    #[test]
    fn test_default_role() {
        assert_eq!(resolve_role(None, &Value::Null, None), "user");
        assert_eq!(resolve_role(Some(""), &json!({"role": ""}), Some("")), "user");
    }
}
