//! Origin validation: reject state-changing requests sent from an origin the
//! auth instance does not trust.
//!
//! Requests without `Origin` (or `Referer`) are non-browser clients and pass.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, header};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

use crate::AppState;
use crate::auth::{AuthError, AuthInstance};

/// Origin a browser attached to the request, falling back to the referer.
pub fn request_origin(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::ORIGIN)
        .or_else(|| headers.get(header::REFERER))
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Check one request against the trusted origins.
pub fn check_origin(
    auth: &AuthInstance,
    method: &Method,
    headers: &HeaderMap,
) -> Result<(), AuthError> {
    if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
        return Ok(());
    }
    match request_origin(headers) {
        Some(origin) if !auth.is_trusted_origin(origin) => {
            tracing::warn!(origin, "rejected request from untrusted origin");
            Err(AuthError::InvalidOrigin)
        }
        _ => Ok(()),
    }
}

/// Axum middleware for the auth wire endpoints.
pub async fn require_trusted_origin(
    State(auth): State<Arc<AuthInstance>>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    check_origin(&auth, req.method(), req.headers())?;
    Ok(next.run(req).await)
}

/// Axum middleware for form posts on the pages and the posts API.
pub async fn require_trusted_page_origin(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    check_origin(&state.auth, req.method(), req.headers())?;
    Ok(next.run(req).await)
}
