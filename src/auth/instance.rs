//! The auth instance: email/password accounts and cookie sessions over a
//! `Store`.

use axum::Router;
use axum::extract::Request;
use axum::http::HeaderMap;
use axum::response::Response;
use base64::Engine;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tower::ServiceExt;
use url::Url;
use uuid::Uuid;

use super::cookie::{self, CookieOptions};
use super::{AuthError, AuthOptions, handler, password};
use crate::ocsf::{self, AuthActivity};
use crate::session::{Session, SessionWithUser, User};
use crate::store::{Account, AnyStore, CREDENTIAL_PROVIDER, Store, StoreError};
use crate::types::{AuthSuccess, SignInEmail, SignUpEmail};

const MIN_SECRET_LEN: usize = 32;

/// Client details recorded on new sessions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let ip_address = header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .or_else(|| header("x-real-ip"))
            .map(String::from);

        Self {
            ip_address,
            user_agent: header("user-agent").map(String::from),
        }
    }
}

/// Server-side authentication handler bound to a store, base URL, secret
/// and set of trusted origins.
pub struct AuthInstance {
    store: Arc<AnyStore>,
    options: AuthOptions,
    trusted_origins: Vec<String>,
    cookie: CookieOptions,
}

/// A session found by cookie lookup.
#[derive(Debug, Clone)]
pub struct SessionLookup {
    pub found: SessionWithUser,
    /// The expiry slid forward during this lookup.
    pub refreshed: bool,
}

impl AuthInstance {
    pub fn new(store: Arc<AnyStore>, options: AuthOptions) -> Result<Self, AuthError> {
        Self::validate(&options)?;

        let mut trusted_origins = vec![origin_of(&options.server_url)
            .ok_or_else(|| AuthError::InvalidServerUrl(options.server_url.clone()))?];
        for raw in &options.trusted_origins {
            match origin_of(raw) {
                Some(origin) if !trusted_origins.contains(&origin) => trusted_origins.push(origin),
                Some(_) => {}
                None => tracing::warn!("ignoring unparseable trusted origin {:?}", raw),
            }
        }

        let cookie = CookieOptions {
            https_only: options.https_only,
            domain: options.cookie_domain.clone(),
            max_age_secs: options.session_ttl.num_seconds(),
        };

        Ok(Self {
            store,
            options,
            trusted_origins,
            cookie,
        })
    }

    /// Check the construction invariants without building anything.
    pub fn validate(options: &AuthOptions) -> Result<(), AuthError> {
        if options.secret.chars().count() < MIN_SECRET_LEN {
            return Err(AuthError::SecretTooShort);
        }
        if !options.api_path.starts_with('/') {
            return Err(AuthError::InvalidApiPath(options.api_path.clone()));
        }
        if origin_of(&options.server_url).is_none() {
            return Err(AuthError::InvalidServerUrl(options.server_url.clone()));
        }
        Ok(())
    }

    pub fn options(&self) -> &AuthOptions {
        &self.options
    }

    pub fn store(&self) -> &AnyStore {
        &self.store
    }

    /// Path the wire endpoints are mounted at, e.g. `/api/auth`.
    pub fn mount_path(&self) -> String {
        format!("{}/auth", self.options.api_path.trim_end_matches('/'))
    }

    /// Absolute URL of the wire endpoints, e.g. `http://localhost:3001/api/auth`.
    pub fn base_url(&self) -> String {
        format!(
            "{}{}",
            self.options.server_url.trim_end_matches('/'),
            self.mount_path()
        )
    }

    pub fn is_trusted_origin(&self, origin: &str) -> bool {
        origin_of(origin).is_some_and(|o| self.trusted_origins.contains(&o))
    }

    /// Resolve the session named by the request's cookie.
    ///
    /// Missing, empty, tampered or unknown cookies yield `Ok(None)`. Expired
    /// sessions are deleted and yield `Ok(None)`. Store failures are errors.
    pub async fn get_session(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<SessionWithUser>, AuthError> {
        Ok(self.lookup_session(headers).await?.map(|lookup| lookup.found))
    }

    /// Like `get_session`, but also reports whether the expiry slid forward.
    /// A refreshed session needs its cookie re-issued (`session_cookie`).
    pub async fn lookup_session(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<SessionLookup>, AuthError> {
        let Some(token) = self.token_from(headers) else {
            return Ok(None);
        };
        let Some(mut found) = self.store.find_session(&token).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        if found.session.expires_at <= now {
            tracing::debug!(session_id = %found.session.id, "session expired");
            self.store.delete_session(&token).await?;
            return Ok(None);
        }

        let refresh_due = found.session.expires_at - self.options.session_ttl
            + self.options.session_update_age;
        let refreshed = now >= refresh_due;
        if refreshed {
            let expires_at = now + self.options.session_ttl;
            self.store.touch_session(&token, expires_at, now).await?;
            found.session.expires_at = expires_at;
            found.session.updated_at = now;
            tracing::debug!(session_id = %found.session.id, "session expiry extended");
        }

        Ok(Some(SessionLookup { found, refreshed }))
    }

    /// Create an account and sign it in.
    pub async fn sign_up_email(
        &self,
        request: SignUpEmail,
        meta: &RequestMeta,
    ) -> Result<AuthSuccess, AuthError> {
        let email = normalize_email(&request.email)?;
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AuthError::MissingName);
        }
        password::check_length(&request.password)?;

        let plain = request.password;
        let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&plain))
            .await
            .map_err(|e| AuthError::PasswordHash(e.to_string()))??;

        let now = Utc::now();
        let user = User {
            id: Uuid::now_v7().to_string(),
            email: email.clone(),
            name: Some(name.to_string()),
            email_verified: false,
            created_at: now,
            updated_at: now,
        };
        let account = Account {
            id: Uuid::now_v7().to_string(),
            user_id: user.id.clone(),
            provider_id: CREDENTIAL_PROVIDER.into(),
            password_hash,
            created_at: now,
        };

        if let Err(e) = self.store.create_user(&user, &account).await {
            ocsf::authentication_event(
                AuthActivity::Logon,
                false,
                Some(&email),
                &format!("Sign-up failed: {e}"),
            );
            return Err(match e {
                StoreError::Conflict(_) => AuthError::UserAlreadyExists,
                other => other.into(),
            });
        }

        let session = self.create_session(&user, meta).await?;
        ocsf::authentication_event(AuthActivity::Logon, true, Some(&email), "Account created");
        Ok(AuthSuccess { session, user })
    }

    /// Verify email/password and open a new session.
    pub async fn sign_in_email(
        &self,
        request: SignInEmail,
        meta: &RequestMeta,
    ) -> Result<AuthSuccess, AuthError> {
        let email = normalize_email(&request.email)?;

        let Some((user, account)) = self.store.find_credentials(&email).await? else {
            ocsf::authentication_event(
                AuthActivity::Logon,
                false,
                Some(&email),
                "Sign-in failed: unknown account",
            );
            return Err(AuthError::InvalidCredentials);
        };

        let plain = request.password;
        let hash = account.password_hash;
        let matches =
            tokio::task::spawn_blocking(move || password::verify_password(&plain, &hash))
                .await
                .map_err(|e| AuthError::PasswordHash(e.to_string()))?;

        if !matches {
            ocsf::authentication_event(
                AuthActivity::Logon,
                false,
                Some(&email),
                "Sign-in failed: wrong password",
            );
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.create_session(&user, meta).await?;
        ocsf::authentication_event(AuthActivity::Logon, true, Some(&email), "Signed in");
        Ok(AuthSuccess { session, user })
    }

    /// Delete the session named by the request's cookie, if any.
    pub async fn sign_out(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let Some(token) = self.token_from(headers) else {
            return Ok(());
        };

        let email = self
            .store
            .find_session(&token)
            .await?
            .map(|found| found.user.email);
        self.store.delete_session(&token).await?;

        if email.is_some() {
            ocsf::authentication_event(
                AuthActivity::Logoff,
                true,
                email.as_deref(),
                "User signed out",
            );
        }
        Ok(())
    }

    /// `Set-Cookie` value carrying a signed session token.
    pub fn session_cookie(&self, token: &str) -> String {
        let signed = cookie::sign_token(self.options.secret.as_bytes(), token);
        cookie::set_cookie(&self.cookie, &signed)
    }

    /// `Set-Cookie` value removing the session cookie.
    pub fn clear_session_cookie(&self) -> String {
        cookie::clear_cookie(&self.cookie)
    }

    /// Router serving the wire endpoints, to be nested at `mount_path()`.
    pub fn router<S>(self: &Arc<Self>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        handler::routes(self.clone())
    }

    /// Serve a single request against the wire endpoints. Paths are relative
    /// to `mount_path()`.
    pub async fn handle(self: &Arc<Self>, request: Request) -> Response {
        match self.router::<()>().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    fn token_from(&self, headers: &HeaderMap) -> Option<String> {
        let raw = cookie::read_session_cookie(headers)?;
        let token = cookie::verify_token(self.options.secret.as_bytes(), raw);
        if token.is_none() {
            tracing::debug!("session cookie failed verification");
        }
        token
    }

    async fn create_session(&self, user: &User, meta: &RequestMeta) -> Result<Session, AuthError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::now_v7().to_string(),
            token: generate_token(),
            user_id: user.id.clone(),
            expires_at: now + self.options.session_ttl,
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
            created_at: now,
            updated_at: now,
        };
        self.store.create_session(&session).await?;
        Ok(session)
    }
}

fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// ASCII origin (`scheme://host[:port]`) of a URL, if it has one.
pub(crate) fn origin_of(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Trim and lower-case an email address, rejecting obviously invalid ones.
pub(crate) fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    let (local, domain) = email.split_once('@').ok_or(AuthError::InvalidEmail)?;
    let well_formed = !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace);
    if !well_formed {
        return Err(AuthError::InvalidEmail);
    }
    Ok(email)
}
