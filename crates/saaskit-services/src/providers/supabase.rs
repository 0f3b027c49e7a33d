//! Supabase Auth (GoTrue REST) implementation of [`AuthProvider`].
//!
//! Users returned from every call are merged with their `user_profiles` role
//! through the database provider. A failed profile lookup is logged and the
//! role falls back to user metadata; it never fails the auth call.

use super::auth::{resolve_role, AuthProvider, SessionEvent};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use saaskit_core::constants::{tables, DEFAULT_USER_ROLE};
use saaskit_core::models::{
    AuthSession, MfaEnrollment, MfaFactor, MfaFactorStatus, MfaVerifyParams, OAuthProvider,
    SignInParams, SignUpParams, User,
};
use saaskit_core::AppError;
use saaskit_db::DatabaseProvider;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

const SESSION_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    user_metadata: Value,
    #[serde(default)]
    factors: Option<Vec<GoTrueFactor>>,
}

#[derive(Debug, Deserialize)]
struct GoTrueSession {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: GoTrueUser,
}

#[derive(Debug, Deserialize)]
struct GoTrueFactor {
    id: String,
    factor_type: String,
    status: String,
    #[serde(default)]
    friendly_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoTrueChallenge {
    id: String,
}

/// GoTrue reports errors under several keys depending on the endpoint
#[derive(Debug, Default, Deserialize)]
struct GoTrueError {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn error_message(status: StatusCode, body: &str) -> String {
    let parsed: GoTrueError = serde_json::from_str(body).unwrap_or_default();
    parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

#[derive(Clone)]
pub struct SupabaseAuthProvider {
    client: Client,
    base_url: String,
    anon_key: String,
    app_url: String,
    profiles: Arc<dyn DatabaseProvider>,
    events: broadcast::Sender<SessionEvent>,
}

impl SupabaseAuthProvider {
    pub fn new(
        client: Client,
        base_url: &str,
        anon_key: &str,
        app_url: &str,
        profiles: Arc<dyn DatabaseProvider>,
    ) -> Self {
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            app_url: app_url.trim_end_matches('/').to_string(),
            profiles,
            events,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str, bearer: Option<&str>) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response, AppError> {
        let response = request
            .send()
            .await
            .map_err(|e| AppError::auth(operation, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(AppError::auth(operation, error_message(status, &body)))
    }

    async fn read_json<T: DeserializeOwned>(
        operation: &str,
        response: Response,
    ) -> Result<T, AppError> {
        response
            .json::<T>()
            .await
            .map_err(|e| AppError::auth(operation, e))
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    async fn profile_role(&self, user_id: &str) -> Option<String> {
        match self.profiles.get_by_id(tables::USER_PROFILES, user_id).await {
            Ok(Some(row)) => row.get("role").and_then(Value::as_str).map(str::to_string),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user_id, "Failed to fetch user profile");
                None
            }
        }
    }

    async fn user_with_profile(&self, operation: &str, auth_user: GoTrueUser) -> Result<User, AppError> {
        let id = Uuid::parse_str(&auth_user.id).map_err(|e| AppError::auth(operation, e))?;
        let profile_role = self.profile_role(&auth_user.id).await;
        let metadata = if auth_user.user_metadata.is_null() {
            json!({})
        } else {
            auth_user.user_metadata
        };
        let role = resolve_role(profile_role.as_deref(), &metadata, auth_user.role.as_deref());

        Ok(User {
            id,
            email: auth_user.email.unwrap_or_default(),
            role,
            metadata,
        })
    }

    async fn into_session(&self, operation: &str, session: GoTrueSession) -> Result<AuthSession, AppError> {
        let expires_at = session
            .expires_at
            .or_else(|| session.expires_in.map(|secs| Utc::now().timestamp() + secs));
        let user = self.user_with_profile(operation, session.user).await?;
        Ok(AuthSession {
            user,
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_at,
        })
    }

    async fn fetch_auth_user(
        &self,
        operation: &str,
        access_token: &str,
    ) -> Result<Option<GoTrueUser>, AppError> {
        let response = self
            .request(reqwest::Method::GET, "/user", Some(access_token))
            .send()
            .await
            .map_err(|e| AppError::auth(operation, e))?;

        match response.status() {
            s if s.is_success() => Ok(Some(Self::read_json(operation, response).await?)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(status = status.as_u16(), "Unexpected response fetching auth user");
                Err(AppError::auth(operation, error_message(status, &body)))
            }
        }
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuthProvider {
    #[tracing::instrument(skip(self, params), fields(auth.operation = "sign_up"))]
    async fn sign_up(&self, params: SignUpParams) -> Result<User, AppError> {
        let mut data = params.metadata;
        data.entry("role")
            .or_insert_with(|| Value::String(DEFAULT_USER_ROLE.to_string()));

        let request = self
            .request(reqwest::Method::POST, "/signup", None)
            .json(&json!({
                "email": params.email,
                "password": params.password,
                "data": data,
            }));
        let response = self.send("Sign up", request).await?;
        let body: Value = Self::read_json("Sign up", response).await?;

        // Autoconfirm projects answer with a session, others with the bare user
        let user_value = match body.get("user") {
            Some(user) if user.is_object() => user.clone(),
            _ if body.get("id").is_some() => body,
            _ => {
                return Err(AppError::Auth(
                    "Sign up failed: No user returned".to_string(),
                ))
            }
        };
        let auth_user: GoTrueUser =
            serde_json::from_value(user_value).map_err(|e| AppError::auth("Sign up", e))?;

        self.user_with_profile("Sign up", auth_user).await
    }

    #[tracing::instrument(skip(self, params), fields(auth.operation = "sign_in"))]
    async fn sign_in(&self, params: SignInParams) -> Result<AuthSession, AppError> {
        let request = self
            .request(reqwest::Method::POST, "/token?grant_type=password", None)
            .json(&json!({"email": params.email, "password": params.password}));
        let response = self.send("Sign in", request).await?;
        let session: GoTrueSession = Self::read_json("Sign in", response).await?;
        let session = self.into_session("Sign in", session).await?;

        self.emit(SessionEvent::SignedIn {
            user_id: session.user.id,
        });
        Ok(session)
    }

    #[tracing::instrument(skip(self, access_token), fields(auth.operation = "sign_out"))]
    async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        let request = self.request(reqwest::Method::POST, "/logout", Some(access_token));
        self.send("Sign out", request).await?;
        self.emit(SessionEvent::SignedOut);
        Ok(())
    }

    #[tracing::instrument(skip(self, access_token), fields(auth.operation = "get_user"))]
    async fn get_user(&self, access_token: &str) -> Result<Option<User>, AppError> {
        match self.fetch_auth_user("Get user", access_token).await {
            Ok(Some(auth_user)) => Ok(Some(self.user_with_profile("Get user", auth_user).await?)),
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::debug!(error = %e, "Treating failed user lookup as signed out");
                Ok(None)
            }
        }
    }

    #[tracing::instrument(skip(self, access_token), fields(auth.operation = "get_session"))]
    async fn get_session(&self, access_token: &str) -> Result<Option<AuthSession>, AppError> {
        let Some(auth_user) = self.fetch_auth_user("Get session", access_token).await? else {
            return Ok(None);
        };
        let user = self.user_with_profile("Get session", auth_user).await?;

        Ok(Some(AuthSession {
            user,
            access_token: access_token.to_string(),
            refresh_token: None,
            expires_at: None,
        }))
    }

    #[tracing::instrument(skip(self, refresh_token), fields(auth.operation = "refresh_session"))]
    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, AppError> {
        let request = self
            .request(reqwest::Method::POST, "/token?grant_type=refresh_token", None)
            .json(&json!({"refresh_token": refresh_token}));
        let response = self.send("Refresh session", request).await?;
        let session: GoTrueSession = Self::read_json("Refresh session", response).await?;
        let session = self.into_session("Refresh session", session).await?;

        self.emit(SessionEvent::TokenRefreshed {
            user_id: session.user.id,
        });
        Ok(session)
    }

    #[tracing::instrument(skip(self, email), fields(auth.operation = "reset_password"))]
    async fn reset_password(&self, email: &str) -> Result<(), AppError> {
        let request = self
            .request(reqwest::Method::POST, "/recover", None)
            .json(&json!({"email": email}));
        self.send("Reset password", request).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, access_token, metadata), fields(auth.operation = "update_user"))]
    async fn update_user(
        &self,
        access_token: &str,
        metadata: Map<String, Value>,
    ) -> Result<User, AppError> {
        let request = self
            .request(reqwest::Method::PUT, "/user", Some(access_token))
            .json(&json!({"data": metadata}));
        let response = self.send("Update user", request).await?;
        let auth_user: GoTrueUser = Self::read_json("Update user", response).await?;
        let user = self.user_with_profile("Update user", auth_user).await?;

        self.emit(SessionEvent::UserUpdated { user_id: user.id });
        Ok(user)
    }

    async fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
    ) -> Result<String, AppError> {
        let redirect = match redirect_to {
            Some(url) => url.to_string(),
            None => format!("{}/auth/callback", self.app_url),
        };
        Ok(format!(
            "{}?provider={}&redirect_to={}",
            self.url("/authorize"),
            provider,
            urlencoding::encode(&redirect)
        ))
    }

    #[tracing::instrument(skip(self, access_token), fields(auth.operation = "enroll_mfa"))]
    async fn enroll_mfa(
        &self,
        access_token: &str,
        friendly_name: Option<&str>,
    ) -> Result<MfaEnrollment, AppError> {
        let request = self
            .request(reqwest::Method::POST, "/factors", Some(access_token))
            .json(&json!({"factor_type": "totp", "friendly_name": friendly_name}));
        let response = self.send("MFA enrollment", request).await?;
        Self::read_json("MFA enrollment", response).await
    }

    #[tracing::instrument(skip(self, access_token, params), fields(auth.operation = "verify_mfa"))]
    async fn verify_mfa(
        &self,
        access_token: &str,
        params: MfaVerifyParams,
    ) -> Result<(), AppError> {
        let factor = urlencoding::encode(&params.factor_id).into_owned();

        let challenge_id = match params.challenge_id {
            Some(id) => id,
            None => {
                let request = self.request(
                    reqwest::Method::POST,
                    &format!("/factors/{}/challenge", factor),
                    Some(access_token),
                );
                let response = self.send("MFA challenge", request).await?;
                let challenge: GoTrueChallenge = Self::read_json("MFA challenge", response).await?;
                challenge.id
            }
        };

        let request = self
            .request(
                reqwest::Method::POST,
                &format!("/factors/{}/verify", factor),
                Some(access_token),
            )
            .json(&json!({"challenge_id": challenge_id, "code": params.code}));
        self.send("MFA verification", request).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, access_token), fields(auth.operation = "unenroll_mfa"))]
    async fn unenroll_mfa(&self, access_token: &str, factor_id: &str) -> Result<(), AppError> {
        let request = self.request(
            reqwest::Method::DELETE,
            &format!("/factors/{}", urlencoding::encode(factor_id)),
            Some(access_token),
        );
        self.send("MFA unenrollment", request).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, access_token), fields(auth.operation = "list_mfa_factors"))]
    async fn list_mfa_factors(&self, access_token: &str) -> Result<Vec<MfaFactor>, AppError> {
        let request = self.request(reqwest::Method::GET, "/user", Some(access_token));
        let response = self.send("List MFA factors", request).await?;
        let auth_user: GoTrueUser = Self::read_json("List MFA factors", response).await?;

        Ok(auth_user
            .factors
            .unwrap_or_default()
            .into_iter()
            .filter(|f| f.factor_type == "totp")
            .map(|f| MfaFactor {
                id: f.id,
                factor_type: f.factor_type,
                status: if f.status == "verified" {
                    MfaFactorStatus::Verified
                } else {
                    MfaFactorStatus::Unverified
                },
                friendly_name: f.friendly_name,
            })
            .collect())
    }

    fn session_events(&self) -> Option<broadcast::Receiver<SessionEvent>> {
        Some(self.events.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saaskit_db::MemoryDatabaseProvider;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const USER_ID: &str = "0b6a5d0e-7f6c-4c64-9a3e-1d2c3b4a5f60";

    fn auth_user(role_metadata: Option<&str>) -> Value {
        let mut metadata = json!({"first_name": "Jane"});
        if let Some(role) = role_metadata {
            metadata["role"] = json!(role);
        }
        json!({
            "id": USER_ID,
            "email": "jane@example.com",
            "role": "authenticated",
            "user_metadata": metadata,
        })
    }

    fn session_body(role_metadata: Option<&str>) -> Value {
        json!({
            "access_token": "access-123",
            "refresh_token": "refresh-456",
            "expires_at": 1_900_000_000i64,
            "user": auth_user(role_metadata),
        })
    }

    async fn provider(server: &MockServer, db: Arc<dyn DatabaseProvider>) -> SupabaseAuthProvider {
        SupabaseAuthProvider::new(
            Client::new(),
            &server.uri(),
            "anon-key",
            "http://localhost:3000",
            db,
        )
    }

    #[tokio::test]
    async fn test_sign_in_merges_profile_role() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body(Some("user"))))
            .mount(&server)
            .await;

        let db = MemoryDatabaseProvider::new();
        db.insert(
            "profiles",
            json!({"id": USER_ID, "email": "jane@example.com", "role": "admin"}),
        )
        .await
        .unwrap();

        let auth = provider(&server, Arc::new(db)).await;
        let mut events = auth.session_events().unwrap();

        let session = auth
            .sign_in(SignInParams {
                email: "jane@example.com".to_string(),
                password: "Secret123".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(session.access_token, "access-123");
        assert_eq!(session.refresh_token.as_deref(), Some("refresh-456"));
        assert_eq!(session.user.role, "admin");
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::SignedIn {
                user_id: Uuid::parse_str(USER_ID).unwrap()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_profile_falls_back_to_metadata_role() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer access-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(auth_user(Some("guest"))))
            .mount(&server)
            .await;

        let auth = provider(&server, Arc::new(MemoryDatabaseProvider::new())).await;
        let user = auth.get_user("access-123").await.unwrap().unwrap();
        assert_eq!(user.role, "guest");
        assert_eq!(user.email, "jane@example.com");
    }

    #[tokio::test]
    async fn test_get_user_with_invalid_token_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"msg": "invalid JWT"})),
            )
            .mount(&server)
            .await;

        let auth = provider(&server, Arc::new(MemoryDatabaseProvider::new())).await;
        assert!(auth.get_user("bad-token").await.unwrap().is_none());
        assert!(auth.get_session("bad-token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_error_carries_operation_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let auth = provider(&server, Arc::new(MemoryDatabaseProvider::new())).await;
        let err = auth
            .sign_in(SignInParams {
                email: "jane@example.com".to_string(),
                password: "wrong".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Sign in error: Invalid login credentials");
    }

    #[tokio::test]
    async fn test_sign_up_sets_default_role_and_accepts_bare_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .and(body_partial_json(json!({"data": {"role": "user"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(auth_user(Some("user"))))
            .mount(&server)
            .await;

        let auth = provider(&server, Arc::new(MemoryDatabaseProvider::new())).await;
        let user = auth
            .sign_up(SignUpParams {
                email: "jane@example.com".to_string(),
                password: "Secret123".to_string(),
                metadata: Map::new(),
            })
            .await
            .unwrap();
        assert_eq!(user.id, Uuid::parse_str(USER_ID).unwrap());
        assert_eq!(user.role, "user");
    }

    #[tokio::test]
    async fn test_verify_mfa_creates_challenge_when_missing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/factors/factor-1/challenge"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "challenge-9"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/factors/factor-1/verify"))
            .and(body_partial_json(json!({"challenge_id": "challenge-9", "code": "123456"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(session_body(None)))
            .expect(1)
            .mount(&server)
            .await;

        let auth = provider(&server, Arc::new(MemoryDatabaseProvider::new())).await;
        auth.verify_mfa(
            "access-123",
            MfaVerifyParams {
                factor_id: "factor-1".to_string(),
                challenge_id: None,
                code: "123456".to_string(),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_list_mfa_factors_keeps_totp_only() {
        let server = MockServer::start().await;
        let mut user = auth_user(None);
        user["factors"] = json!([
            {"id": "f1", "factor_type": "totp", "status": "verified", "friendly_name": "Phone"},
            {"id": "f2", "factor_type": "phone", "status": "unverified"},
            {"id": "f3", "factor_type": "totp", "status": "unverified"}
        ]);
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user))
            .mount(&server)
            .await;

        let auth = provider(&server, Arc::new(MemoryDatabaseProvider::new())).await;
        let factors = auth.list_mfa_factors("access-123").await.unwrap();
        assert_eq!(factors.len(), 2);
        assert_eq!(factors[0].status, MfaFactorStatus::Verified);
        assert_eq!(factors[1].status, MfaFactorStatus::Unverified);
    }

    #[tokio::test]
    async fn test_oauth_url_defaults_to_app_callback() {
        let server = MockServer::start().await;
        let auth = provider(&server, Arc::new(MemoryDatabaseProvider::new())).await;
        let url = auth
            .sign_in_with_oauth(OAuthProvider::Google, None)
            .await
            .unwrap();
        assert_eq!(
            url,
            format!(
                "{}/auth/v1/authorize?provider=google&redirect_to=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fcallback",
                server.uri()
            )
        );
    }
}
