use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::sync::LazyLock;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Authenticated user, merged from the auth record and the profile table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Caller-held session returned by sign in and refresh
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthSession {
    pub user: User,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds)
    #[serde(default)]
    pub expires_at: Option<i64>,
}

/// Row of the `user_profiles` view, serialized with the same field names as
/// [`UpdateProfileRequest`]
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    #[serde(default, alias = "first_name")]
    pub first_name: Option<String>,
    #[serde(default, alias = "last_name")]
    pub last_name: Option<String>,
    #[serde(default, alias = "avatar_url")]
    pub avatar_url: Option<String>,
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(alias = "updated_at")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SignUpParams {
    pub email: String,
    pub password: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct SignInParams {
    pub email: String,
    pub password: String,
}

/// Third-party identity providers accepted for OAuth sign in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Azure,
    Apple,
}

impl Display for OAuthProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            OAuthProvider::Google => write!(f, "google"),
            OAuthProvider::Azure => write!(f, "azure"),
            OAuthProvider::Apple => write!(f, "apple"),
        }
    }
}

impl FromStr for OAuthProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(OAuthProvider::Google),
            "azure" => Ok(OAuthProvider::Azure),
            "apple" => Ok(OAuthProvider::Apple),
            _ => Err(anyhow::anyhow!("Unsupported OAuth provider: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TotpDetails {
    pub qr_code: String,
    pub secret: String,
    pub uri: String,
}

/// Result of enrolling a TOTP factor; the factor stays unverified until
/// a code is verified against it
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MfaEnrollment {
    pub id: String,
    #[serde(default)]
    pub totp: Option<TotpDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MfaFactorStatus {
    Verified,
    Unverified,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MfaFactor {
    pub id: String,
    #[serde(rename = "type")]
    pub factor_type: String,
    pub status: MfaFactorStatus,
    #[serde(default)]
    pub friendly_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MfaVerifyParams {
    pub factor_id: String,
    #[serde(default)]
    pub challenge_id: Option<String>,
    pub code: String,
}

static UPPERCASE: LazyLock<Regex> = LazyLock::new(|| Regex::new("[A-Z]").expect("uppercase pattern"));
static LOWERCASE: LazyLock<Regex> = LazyLock::new(|| Regex::new("[a-z]").expect("lowercase pattern"));
static DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new("[0-9]").expect("digit pattern"));

/// At least 8 characters with an uppercase letter, a lowercase letter and a number
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let message = if password.chars().count() < 8 {
        Some("Password must be at least 8 characters")
    } else if !UPPERCASE.is_match(password) {
        Some("Password must contain at least one uppercase letter")
    } else if !LOWERCASE.is_match(password) {
        Some("Password must contain at least one lowercase letter")
    } else if !DIGIT.is_match(password) {
        Some("Password must contain at least one number")
    } else {
        None
    };

    match message {
        None => Ok(()),
        Some(msg) => {
            let mut err = ValidationError::new("password_strength");
            err.message = Some(msg.into());
            Err(err)
        }
    }
}

/// Request DTO for signing up
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(custom(function = "validate_password_strength"))]
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Request DTO for signing in
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PasswordResetRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

/// Request DTO for updating a profile
#[derive(Debug, Default, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    #[validate(url(message = "Avatar URL must be a valid URL"))]
    pub avatar_url: Option<String>,
}

/// Request DTO for creating a user from the admin area
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(custom(function = "validate_password_strength"))]
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_strength_rules() {
        assert!(validate_password_strength("Passw0rd").is_ok());
        assert!(validate_password_strength("Pa0").is_err());
        assert!(validate_password_strength("password1").is_err());
        assert!(validate_password_strength("PASSWORD1").is_err());
        assert!(validate_password_strength("Password").is_err());
    }

    #[test]
    fn test_register_request_validation() {
        let ok = RegisterRequest {
            email: "jane@example.com".to_string(),
            password: "Secret123".to_string(),
            first_name: None,
            last_name: None,
        };
        assert!(ok.validate().is_ok());

        let bad_email = RegisterRequest {
            email: "not-an-email".to_string(),
            ..ok
        };
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn test_oauth_provider_round_trips_names() {
        assert_eq!("google".parse::<OAuthProvider>().unwrap(), OAuthProvider::Google);
        assert_eq!(OAuthProvider::Azure.to_string(), "azure");
        assert!("github".parse::<OAuthProvider>().is_err());
    }
}
