//! Axum middleware applying the route guards.
//!
//! Guard redirects are 303 See Other, so a form posted without a session
//! lands on the login page as a GET instead of being replayed there.

use axum::extract::{Request, State};
use axum::http::{HeaderValue, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use std::sync::Arc;

use crate::AppState;
use crate::auth::cookie::COOKIE_NAME;
use crate::context::RouterContext;
use crate::guard::{self, DEFAULT_AUTHENTICATED_ROUTE, ProtectGuard, RouteDecision};
use crate::session;

/// Root middleware: resolve the session once and attach a fresh
/// `RouterContext` to the request. Re-issues the session cookie when the
/// lookup extended the session, unless the handler set the cookie itself.
pub async fn attach_context(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let resolved = session::resolve_session(&state.auth, req.headers()).await;
    req.extensions_mut()
        .insert(RouterContext::new(resolved.session, state.query_cache.clone()));

    let mut response = next.run(req).await;
    if let Some(cookie) = resolved.refreshed_cookie
        && !sets_session_cookie(&response)
        && let Ok(value) = HeaderValue::from_str(&cookie)
    {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

fn sets_session_cookie(response: &Response) -> bool {
    let prefix = format!("{COOKIE_NAME}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

/// Protect guard: redirect to login unless the request has a session.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let location = guard::return_location(req.method(), req.uri());

    let mut guard = ProtectGuard::new();
    let decision = match req.extensions().get::<RouterContext>().cloned() {
        Some(ctx) => guard.check(ctx, &location),
        None => {
            let headers = req.headers().clone();
            guard
                .run(&state.auth, &headers, &location, state.query_cache.clone())
                .await
        }
    };

    match decision {
        RouteDecision::Continue(ctx) => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        RouteDecision::Redirect(to) => Redirect::to(&to).into_response(),
    }
}

/// Guest-only guard: send authenticated users to the dashboard.
pub async fn redirect_authenticated(req: Request, next: Next) -> Response {
    let decision = match req.extensions().get::<RouterContext>() {
        Some(ctx) => guard::guest_only(ctx, DEFAULT_AUTHENTICATED_ROUTE),
        None => return next.run(req).await,
    };

    match decision {
        RouteDecision::Continue(_) => next.run(req).await,
        RouteDecision::Redirect(to) => Redirect::to(&to).into_response(),
    }
}
