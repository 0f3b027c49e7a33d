//! End-user authentication flows on top of the auth provider.

use crate::providers::AuthProvider;
use saaskit_core::constants::DEFAULT_USER_ROLE;
use saaskit_core::models::{
    AuthSession, LoginRequest, MfaEnrollment, MfaFactor, MfaVerifyParams, OAuthProvider,
    RegisterRequest, SignInParams, SignUpParams, User,
};
use saaskit_core::AppError;
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn with_default_role(mut user: User) -> User {
    if user.role.is_empty() {
        user.role = DEFAULT_USER_ROLE.to_string();
    }
    user
}

#[derive(Clone)]
pub struct AuthService {
    auth: Arc<dyn AuthProvider>,
}

impl AuthService {
    pub fn new(auth: Arc<dyn AuthProvider>) -> Self {
        Self { auth }
    }

    /// Sign up with the default role and the optional name fields as metadata
    #[tracing::instrument(skip(self, request))]
    pub async fn register(&self, request: RegisterRequest) -> Result<User, AppError> {
        let mut metadata = Map::new();
        if let Some(first) = request.first_name {
            metadata.insert("first_name".to_string(), json!(first));
        }
        if let Some(last) = request.last_name {
            metadata.insert("last_name".to_string(), json!(last));
        }
        metadata.insert("role".to_string(), json!(DEFAULT_USER_ROLE));

        let user = self
            .auth
            .sign_up(SignUpParams {
                email: request.email,
                password: request.password,
                metadata,
            })
            .await?;
        Ok(with_default_role(user))
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession, AppError> {
        let mut session = self
            .auth
            .sign_in(SignInParams {
                email: request.email,
                password: request.password,
            })
            .await?;
        session.user = with_default_role(session.user);
        Ok(session)
    }

    pub async fn login_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
    ) -> Result<String, AppError> {
        self.auth.sign_in_with_oauth(provider, redirect_to).await
    }

    pub async fn logout(&self, access_token: &str) -> Result<(), AppError> {
        self.auth.sign_out(access_token).await
    }

    pub async fn current_user(&self, access_token: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .auth
            .get_user(access_token)
            .await?
            .map(with_default_role))
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), AppError> {
        self.auth.reset_password(email).await
    }

    pub async fn update_profile(
        &self,
        access_token: &str,
        metadata: Map<String, Value>,
    ) -> Result<User, AppError> {
        let user = self.auth.update_user(access_token, metadata).await?;
        Ok(with_default_role(user))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AppError> {
        let mut session = self.auth.refresh_session(refresh_token).await?;
        session.user = with_default_role(session.user);
        Ok(session)
    }

    pub async fn is_authenticated(&self, access_token: &str) -> Result<bool, AppError> {
        Ok(self.auth.get_session(access_token).await?.is_some())
    }

    pub async fn enroll_mfa(
        &self,
        access_token: &str,
        friendly_name: Option<&str>,
    ) -> Result<MfaEnrollment, AppError> {
        self.auth.enroll_mfa(access_token, friendly_name).await
    }

    pub async fn verify_mfa(
        &self,
        access_token: &str,
        params: MfaVerifyParams,
    ) -> Result<(), AppError> {
        self.auth.verify_mfa(access_token, params).await
    }

    pub async fn unenroll_mfa(&self, access_token: &str, factor_id: &str) -> Result<(), AppError> {
        self.auth.unenroll_mfa(access_token, factor_id).await
    }

    pub async fn list_mfa_factors(&self, access_token: &str) -> Result<Vec<MfaFactor>, AppError> {
        self.auth.list_mfa_factors(access_token).await
    }
}
