//! Server-side session resolution.

use axum::http::HeaderMap;
use chrono::Utc;

use super::ValidSession;
use crate::auth::AuthInstance;
use crate::error::AppError;
use crate::ocsf::{self, AuthActivity};

/// A resolved session together with the renewed session cookie, present
/// when the lookup slid the expiry forward.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSession {
    pub session: Option<ValidSession>,
    pub refreshed_cookie: Option<String>,
}

/// Resolve the caller's session. Every failure becomes `None`.
pub async fn get_session(auth: &AuthInstance, headers: &HeaderMap) -> Option<ValidSession> {
    resolve_session(auth, headers).await.session
}

/// Resolve the caller's session and the `Set-Cookie` value the response
/// must carry if the session was extended.
pub async fn resolve_session(auth: &AuthInstance, headers: &HeaderMap) -> ResolvedSession {
    let lookup = match auth.lookup_session(headers).await {
        Ok(Some(lookup)) => lookup,
        Ok(None) => return ResolvedSession::default(),
        Err(e) => {
            tracing::warn!("session lookup failed: {}", e);
            return ResolvedSession::default();
        }
    };

    let email = lookup.found.user.email.clone();
    let token = lookup.found.session.token.clone();
    match ValidSession::new(lookup.found, Utc::now()) {
        Ok(valid) => ResolvedSession {
            session: Some(valid),
            refreshed_cookie: lookup.refreshed.then(|| auth.session_cookie(&token)),
        },
        Err(reason) => {
            tracing::warn!(%reason, "discarding malformed session");
            ocsf::authentication_event(
                AuthActivity::Other,
                false,
                Some(email.as_str()).filter(|e| !e.is_empty()),
                &format!("Session rejected: {reason}"),
            );
            ResolvedSession::default()
        }
    }
}

/// Resolve the caller's session or fail with `Unauthorized`.
pub async fn ensure_session(
    auth: &AuthInstance,
    headers: &HeaderMap,
) -> Result<ValidSession, AppError> {
    get_session(auth, headers)
        .await
        .ok_or(AppError::Unauthorized)
}
