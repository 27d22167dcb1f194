//! Auth client: signs in, signs up and signs out against the auth wire
//! endpoints and publishes the current session through a `watch` channel.
//!
//! The underlying `reqwest` client keeps a cookie store, so the session
//! cookie set by sign-in travels with every later call.

use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;

use crate::session::SessionWithUser;
use crate::types::{AuthErrorBody, AuthResponse, SignInEmail, SignUpEmail};

pub const DEFAULT_BASE_PATH: &str = "/api/auth";

#[derive(Debug, Clone)]
pub struct AuthClientOptions {
    /// Server origin, e.g. `http://localhost:3001`.
    pub base_url: String,
    /// Mount path of the auth endpoints, e.g. `/api/auth`.
    pub base_path: String,
}

impl AuthClientOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            base_path: DEFAULT_BASE_PATH.into(),
        }
    }
}

/// Reactive session state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub data: Option<SessionWithUser>,
    /// True until the first fetch completes and while a refetch runs.
    pub is_pending: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            data: None,
            is_pending: true,
        }
    }
}

/// Error returned by the auth endpoints, or a transport failure
/// (`status == 0`, `code == "FETCH_ERROR"`).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} ({code}, status {status})")]
pub struct AuthClientError {
    pub status: u16,
    pub code: String,
    pub message: String,
}

impl From<reqwest::Error> for AuthClientError {
    fn from(e: reqwest::Error) -> Self {
        Self {
            status: e.status().map_or(0, |s| s.as_u16()),
            code: "FETCH_ERROR".into(),
            message: e.to_string(),
        }
    }
}

pub struct AuthClient {
    http: reqwest::Client,
    base: String,
    state: watch::Sender<SessionState>,
}

impl AuthClient {
    pub fn new(options: AuthClientOptions) -> Result<Self, AuthClientError> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        let base = format!(
            "{}{}",
            options.base_url.trim_end_matches('/'),
            options.base_path.trim_end_matches('/')
        );
        let (state, _) = watch::channel(SessionState::default());
        Ok(Self { http, base, state })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub async fn sign_up_email(
        &self,
        request: &SignUpEmail,
    ) -> Result<AuthResponse, AuthClientError> {
        let response = self.post_json("/sign-up/email", request).await?;
        self.refetch().await;
        Ok(response)
    }

    pub async fn sign_in_email(
        &self,
        request: &SignInEmail,
    ) -> Result<AuthResponse, AuthClientError> {
        let response = self.post_json("/sign-in/email", request).await?;
        self.refetch().await;
        Ok(response)
    }

    pub async fn sign_out(&self) -> Result<(), AuthClientError> {
        let resp = self.http.post(self.url("/sign-out")).send().await?;
        check(resp).await?;
        self.refetch().await;
        Ok(())
    }

    /// Fetch the current session once, without touching the reactive state.
    pub async fn get_session(&self) -> Result<Option<SessionWithUser>, AuthClientError> {
        let resp = self.http.get(self.url("/get-session")).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    /// Subscribe to the session state. Triggers the initial fetch if none
    /// has completed yet.
    pub async fn use_session(&self) -> watch::Receiver<SessionState> {
        let receiver = self.state.subscribe();
        if self.state.borrow().is_pending {
            self.refetch().await;
        }
        receiver
    }

    /// Re-read the session and publish it.
    pub async fn refetch(&self) {
        self.state.send_modify(|s| s.is_pending = true);
        let data = match self.get_session().await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("session refetch failed: {}", e);
                None
            }
        };
        self.state.send_replace(SessionState {
            data,
            is_pending: false,
        });
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, AuthClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.http.post(self.url(path)).json(body).send().await?;
        Ok(check(resp).await?.json().await?)
    }
}

/// Pass successful responses through, turn the rest into `AuthClientError`.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, AuthClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<AuthErrorBody>(&text) {
        Ok(body) => (body.code, body.message),
        Err(_) => (
            "UNKNOWN_ERROR".to_string(),
            if text.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            } else {
                text
            },
        ),
    };
    Err(AuthClientError {
        status: status.as_u16(),
        code,
        message,
    })
}

impl AuthClientError {
    pub fn is_status(&self, status: StatusCode) -> bool {
        self.status == status.as_u16()
    }
}
