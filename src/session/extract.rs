//! `RequireSession` extractor for JSON handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;

use super::{ValidSession, ensure_session};
use crate::AppState;
use crate::context::RouterContext;
use crate::error::AppError;

/// A handler argument that only exists for authenticated requests.
///
/// Reuses the session already resolved by `attach_context` when present,
/// otherwise resolves it from the cookie. Rejects with 401.
#[derive(Debug, Clone)]
pub struct RequireSession(pub ValidSession);

impl FromRequestParts<Arc<AppState>> for RequireSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(RouterContext {
            session: Some(session),
            ..
        }) = parts.extensions.get::<RouterContext>()
        {
            return Ok(Self(session.clone()));
        }
        ensure_session(&state.auth, &parts.headers).await.map(Self)
    }
}
