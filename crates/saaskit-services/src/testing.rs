//! In-memory provider fakes for service and API tests.
//!
//! Enabled for this crate's unit tests and for downstream crates through the
//! `testing` feature.

use crate::providers::{AuthProvider, PaymentProvider};
use async_trait::async_trait;
use saaskit_core::constants::DEFAULT_USER_ROLE;
use saaskit_core::models::{
    AuthSession, CheckoutParams, CheckoutSession, CreatePaymentSubscriptionParams, MfaEnrollment,
    MfaFactor, MfaFactorStatus, MfaVerifyParams, OAuthProvider, PaymentSubscription, PortalSession,
    SignInParams, SignUpParams, TotpDetails, User, WebhookEvent,
};
use saaskit_core::AppError;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::providers::MockPaymentProvider;

struct Account {
    user: User,
    password: String,
    factors: Vec<MfaFactor>,
}

#[derive(Default)]
struct AuthState {
    accounts: HashMap<Uuid, Account>,
    access_tokens: HashMap<String, Uuid>,
    refresh_tokens: HashMap<String, Uuid>,
    password_resets: Vec<String>,
}

impl AuthState {
    fn by_email(&self, email: &str) -> Option<&Account> {
        self.accounts
            .values()
            .find(|a| a.user.email.eq_ignore_ascii_case(email))
    }

    fn issue_session(&mut self, user_id: Uuid) -> Option<AuthSession> {
        let user = self.accounts.get(&user_id)?.user.clone();
        let access_token = format!("access-{}", Uuid::new_v4());
        let refresh_token = format!("refresh-{}", Uuid::new_v4());
        self.access_tokens.insert(access_token.clone(), user_id);
        self.refresh_tokens.insert(refresh_token.clone(), user_id);
        Some(AuthSession {
            user,
            access_token,
            refresh_token: Some(refresh_token),
            expires_at: None,
        })
    }

    fn account_for_token(&mut self, operation: &str, token: &str) -> Result<&mut Account, AppError> {
        let user_id = *self
            .access_tokens
            .get(token)
            .ok_or_else(|| AppError::auth(operation, "Invalid access token"))?;
        self.accounts
            .get_mut(&user_id)
            .ok_or_else(|| AppError::auth(operation, "User not found"))
    }
}

/// Auth provider keeping accounts and tokens in memory.
#[derive(Clone, Default)]
pub struct InMemoryAuthProvider {
    state: Arc<RwLock<AuthState>>,
}

impl InMemoryAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account directly and return a signed-in session for it.
    pub async fn seed_user(&self, email: &str, password: &str, role: &str) -> AuthSession {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role: role.to_string(),
            metadata: json!({"role": role}),
        };
        let mut state = self.state.write().await;
        let user_id = user.id;
        state.accounts.insert(
            user_id,
            Account {
                user,
                password: password.to_string(),
                factors: Vec::new(),
            },
        );
        state
            .issue_session(user_id)
            .expect("seeded account exists")
    }

    /// Emails that requested a password reset, in order.
    pub async fn password_resets(&self) -> Vec<String> {
        self.state.read().await.password_resets.clone()
    }
}

#[async_trait]
impl AuthProvider for InMemoryAuthProvider {
    async fn sign_up(&self, params: SignUpParams) -> Result<User, AppError> {
        let mut state = self.state.write().await;
        if state.by_email(&params.email).is_some() {
            return Err(AppError::auth("Sign up", "User already registered"));
        }

        let role = params
            .metadata
            .get("role")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_USER_ROLE)
            .to_string();
        let user = User {
            id: Uuid::new_v4(),
            email: params.email,
            role,
            metadata: Value::Object(params.metadata),
        };
        state.accounts.insert(
            user.id,
            Account {
                user: user.clone(),
                password: params.password,
                factors: Vec::new(),
            },
        );
        Ok(user)
    }

    async fn sign_in(&self, params: SignInParams) -> Result<AuthSession, AppError> {
        let mut state = self.state.write().await;
        let user_id = match state.by_email(&params.email) {
            Some(account) if account.password == params.password => account.user.id,
            _ => return Err(AppError::auth("Sign in", "Invalid login credentials")),
        };
        state
            .issue_session(user_id)
            .ok_or_else(|| AppError::auth("Sign in", "User not found"))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        self.state.write().await.access_tokens.remove(access_token);
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .access_tokens
            .get(access_token)
            .and_then(|id| state.accounts.get(id))
            .map(|a| a.user.clone()))
    }

    async fn get_session(&self, access_token: &str) -> Result<Option<AuthSession>, AppError> {
        Ok(self.get_user(access_token).await?.map(|user| AuthSession {
            user,
            access_token: access_token.to_string(),
            refresh_token: None,
            expires_at: None,
        }))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, AppError> {
        let mut state = self.state.write().await;
        let user_id = state
            .refresh_tokens
            .remove(refresh_token)
            .ok_or_else(|| AppError::auth("Refresh session", "Invalid Refresh Token"))?;
        state
            .issue_session(user_id)
            .ok_or_else(|| AppError::auth("Refresh session", "User not found"))
    }

    async fn reset_password(&self, email: &str) -> Result<(), AppError> {
        self.state
            .write()
            .await
            .password_resets
            .push(email.to_string());
        Ok(())
    }

    async fn update_user(
        &self,
        access_token: &str,
        metadata: Map<String, Value>,
    ) -> Result<User, AppError> {
        let mut state = self.state.write().await;
        let account = state.account_for_token("Update user", access_token)?;
        if let Value::Object(existing) = &mut account.user.metadata {
            existing.extend(metadata);
        } else {
            account.user.metadata = Value::Object(metadata);
        }
        Ok(account.user.clone())
    }

    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
    ) -> Result<String, AppError> {
        Ok(format!(
            "https://auth.test/authorize?provider={}&redirect_to={}",
            provider,
            urlencoding::encode(redirect_to.unwrap_or("http://localhost:3000/auth/callback"))
        ))
    }

    async fn enroll_mfa(
        &self,
        access_token: &str,
        friendly_name: Option<&str>,
    ) -> Result<MfaEnrollment, AppError> {
        let mut state = self.state.write().await;
        let account = state.account_for_token("MFA enrollment", access_token)?;
        let id = Uuid::new_v4().to_string();
        account.factors.push(MfaFactor {
            id: id.clone(),
            factor_type: "totp".to_string(),
            status: MfaFactorStatus::Unverified,
            friendly_name: friendly_name.map(str::to_string),
        });
        Ok(MfaEnrollment {
            id,
            totp: Some(TotpDetails {
                qr_code: "data:image/svg+xml;utf-8,<svg/>".to_string(),
                secret: "JBSWY3DPEHPK3PXP".to_string(),
                uri: format!("otpauth://totp/saaskit:{}", account.user.email),
            }),
        })
    }

    async fn verify_mfa(&self, access_token: &str, params: MfaVerifyParams) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let account = state.account_for_token("MFA verification", access_token)?;
        if params.code.len() != 6 || !params.code.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::auth("MFA verification", "Invalid TOTP code entered"));
        }
        let factor = account
            .factors
            .iter_mut()
            .find(|f| f.id == params.factor_id)
            .ok_or_else(|| AppError::auth("MFA verification", "Factor not found"))?;
        factor.status = MfaFactorStatus::Verified;
        Ok(())
    }

    async fn unenroll_mfa(&self, access_token: &str, factor_id: &str) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let account = state.account_for_token("MFA unenrollment", access_token)?;
        account.factors.retain(|f| f.id != factor_id);
        Ok(())
    }

    async fn list_mfa_factors(&self, access_token: &str) -> Result<Vec<MfaFactor>, AppError> {
        let mut state = self.state.write().await;
        let account = state.account_for_token("List MFA factors", access_token)?;
        Ok(account.factors.clone())
    }
}

/// Payment provider that records checkout requests and otherwise answers
/// like [`MockPaymentProvider`].
#[derive(Clone, Default)]
pub struct RecordingPaymentProvider {
    inner: MockPaymentProvider,
    checkouts: Arc<RwLock<Vec<CheckoutParams>>>,
    customers: Arc<RwLock<Vec<String>>>,
}

impl RecordingPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn checkouts(&self) -> Vec<CheckoutParams> {
        self.checkouts.read().await.clone()
    }

    /// Emails customers were created for, in order.
    pub async fn customers(&self) -> Vec<String> {
        self.customers.read().await.clone()
    }
}

#[async_trait]
impl PaymentProvider for RecordingPaymentProvider {
    async fn create_customer(
        &self,
        email: &str,
        metadata: Map<String, Value>,
    ) -> Result<String, AppError> {
        self.customers.write().await.push(email.to_string());
        self.inner.create_customer(email, metadata).await
    }

    async fn create_subscription(
        &self,
        params: CreatePaymentSubscriptionParams,
    ) -> Result<PaymentSubscription, AppError> {
        self.inner.create_subscription(params).await
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        immediately: bool,
    ) -> Result<PaymentSubscription, AppError> {
        self.inner
            .cancel_subscription(subscription_id, immediately)
            .await
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<PaymentSubscription>, AppError> {
        self.inner.get_subscription(subscription_id).await
    }

    async fn handle_webhook(&self, payload: &str, signature: &str) -> Result<WebhookEvent, AppError> {
        self.inner.handle_webhook(payload, signature).await
    }

    async fn create_checkout_session(
        &self,
        params: CheckoutParams,
    ) -> Result<CheckoutSession, AppError> {
        self.checkouts.write().await.push(params.clone());
        self.inner.create_checkout_session(params).await
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, AppError> {
        self.inner
            .create_portal_session(customer_id, return_url)
            .await
    }
}
