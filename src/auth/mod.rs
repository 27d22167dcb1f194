//! Server-side authentication: the auth instance, its wire endpoints, the
//! memoizing provider and cookie/password primitives.

pub mod cookie;
pub mod handler;
pub mod instance;
pub mod password;
pub mod plugin;
pub mod provider;

pub use instance::{AuthInstance, RequestMeta, SessionLookup};
pub use provider::AuthProvider;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Duration;
use std::fmt;
use std::sync::Arc;

use crate::store::StoreError;
use crate::types::AuthErrorBody;
use plugin::AuthPlugin;

/// Construction options of an `AuthInstance`.
#[derive(Clone)]
pub struct AuthOptions {
    pub server_url: String,
    /// Mount path of the API, must start with `/`. Auth lives at `{api_path}/auth`.
    pub api_path: String,
    /// HMAC key for session cookies, at least 32 characters.
    pub secret: String,
    pub trusted_origins: Vec<String>,
    pub plugins: Vec<Arc<dyn AuthPlugin>>,
    pub session_ttl: Duration,
    /// Sessions older than this get their expiry pushed forward on read.
    pub session_update_age: Duration,
    pub https_only: bool,
    pub cookie_domain: Option<String>,
}

impl fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthOptions")
            .field("server_url", &self.server_url)
            .field("api_path", &self.api_path)
            .field("secret", &"<redacted>")
            .field("trusted_origins", &self.trusted_origins)
            .field(
                "plugins",
                &self.plugins.iter().map(|p| p.id()).collect::<Vec<_>>(),
            )
            .field("session_ttl", &self.session_ttl)
            .field("session_update_age", &self.session_update_age)
            .field("https_only", &self.https_only)
            .field("cookie_domain", &self.cookie_domain)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("auth secret must be at least 32 characters")]
    SecretTooShort,

    #[error("api path must start with '/': {0}")]
    InvalidApiPath(String),

    #[error("invalid server url: {0}")]
    InvalidServerUrl(String),

    #[error("unsupported database url scheme: {0}")]
    UnsupportedDatabase(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("Invalid email")]
    InvalidEmail,

    #[error("Name is required")]
    MissingName,

    #[error("Password too short")]
    PasswordTooShort,

    #[error("Password too long")]
    PasswordTooLong,

    #[error("Invalid origin")]
    InvalidOrigin,

    #[error("Failed to hash password: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// Machine-readable code carried in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::SecretTooShort
            | AuthError::InvalidApiPath(_)
            | AuthError::InvalidServerUrl(_)
            | AuthError::UnsupportedDatabase(_) => "INVALID_CONFIGURATION",
            AuthError::InvalidCredentials => "INVALID_EMAIL_OR_PASSWORD",
            AuthError::UserAlreadyExists => "USER_ALREADY_EXISTS",
            AuthError::InvalidEmail => "INVALID_EMAIL",
            AuthError::MissingName => "MISSING_NAME",
            AuthError::PasswordTooShort => "PASSWORD_TOO_SHORT",
            AuthError::PasswordTooLong => "PASSWORD_TOO_LONG",
            AuthError::InvalidOrigin => "INVALID_ORIGIN",
            AuthError::PasswordHash(_) | AuthError::Store(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::UserAlreadyExists => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::InvalidEmail
            | AuthError::MissingName
            | AuthError::PasswordTooShort
            | AuthError::PasswordTooLong => StatusCode::BAD_REQUEST,
            AuthError::InvalidOrigin => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the end user.
    pub fn public_message(&self) -> String {
        match self.status() {
            StatusCode::INTERNAL_SERVER_ERROR => "Something went wrong".into(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            tracing::error!("auth request failed: {}", self);
        }
        let body = AuthErrorBody {
            code: self.code().into(),
            message: self.public_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(err: AuthError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_invalid_credentials_response() {
        let (status, body) = body_of(AuthError::InvalidCredentials).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_EMAIL_OR_PASSWORD");
        assert_eq!(body["message"], "Invalid email or password");
    }

    #[tokio::test]
    async fn test_user_exists_response() {
        let (status, body) = body_of(AuthError::UserAlreadyExists).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "USER_ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn test_store_errors_are_not_leaked() {
        let (status, body) =
            body_of(AuthError::Store(StoreError::Database("pg: secret detail".into()))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Something went wrong");
    }

    #[test]
    fn test_debug_options_redacts_secret() {
        let opts = crate::config::Config::test_default().auth_options();
        let rendered = format!("{opts:?}");
        assert!(!rendered.contains(&opts.secret));
        assert!(rendered.contains("open-api"));
    }
}
