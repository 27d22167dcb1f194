//! Route guards.
//!
//! Guards never redirect by themselves: they return a `RouteDecision` and
//! the routing layer turns `Redirect` into an HTTP 303.

use axum::http::{HeaderMap, Method, Uri};

use crate::auth::AuthInstance;
use crate::context::{QueryCache, RouterContext};
use crate::session;

/// Where authenticated users land when they hit a guest-only route.
pub const DEFAULT_AUTHENTICATED_ROUTE: &str = "/dashboard";

pub const LOGIN_ROUTE: &str = "/login";

#[derive(Debug, Clone)]
pub enum RouteDecision {
    Continue(RouterContext),
    Redirect(String),
}

impl RouteDecision {
    pub fn is_redirect(&self) -> bool {
        matches!(self, RouteDecision::Redirect(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Unchecked,
    Checking,
    Authorized,
    Redirecting,
}

/// Guard for routes that require a session.
#[derive(Debug)]
pub struct ProtectGuard {
    state: GuardState,
}

impl Default for ProtectGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtectGuard {
    pub fn new() -> Self {
        Self {
            state: GuardState::Unchecked,
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    /// Resolve the session from request headers and decide.
    ///
    /// `location` is the requested path and query, returned to after login.
    pub async fn run(
        &mut self,
        auth: &AuthInstance,
        headers: &HeaderMap,
        location: &str,
        query_cache: QueryCache,
    ) -> RouteDecision {
        self.state = GuardState::Checking;
        let session = session::get_session(auth, headers).await;
        self.check(RouterContext::new(session, query_cache), location)
    }

    /// Decide from a context whose session was already resolved.
    pub fn check(&mut self, ctx: RouterContext, location: &str) -> RouteDecision {
        if ctx.is_authenticated() {
            self.state = GuardState::Authorized;
            RouteDecision::Continue(ctx)
        } else {
            self.state = GuardState::Redirecting;
            tracing::debug!(location, "no session, redirecting to login");
            RouteDecision::Redirect(login_redirect(location))
        }
    }
}

/// `/login?redirect=<location>` with the location percent-encoded.
pub fn login_redirect(location: &str) -> String {
    format!("{LOGIN_ROUTE}?redirect={}", urlencoding::encode(location))
}

/// The location to return to after login.
///
/// GET and HEAD return to the exact path and query. A form post cannot be
/// replayed as a GET, so it returns to the top-level section it was posted
/// from (`/posts/abc/delete` becomes `/posts`).
pub fn return_location(method: &Method, uri: &Uri) -> String {
    if *method == Method::GET || *method == Method::HEAD {
        return uri
            .path_and_query()
            .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());
    }
    match uri.path().trim_start_matches('/').split('/').next() {
        Some(section) if !section.is_empty() => format!("/{section}"),
        _ => "/".to_string(),
    }
}

/// Guard for routes only guests may see (login, sign-up).
pub fn guest_only(ctx: &RouterContext, default_route: &str) -> RouteDecision {
    if ctx.is_authenticated() {
        RouteDecision::Redirect(default_route.to_string())
    } else {
        RouteDecision::Continue(ctx.clone())
    }
}

/// Accept a post-login redirect target only if it is a local path.
pub fn safe_redirect_target(target: Option<&str>) -> &str {
    match target {
        Some(t) if t.starts_with('/') && !t.starts_with("//") && !t.contains('\\') => t,
        _ => DEFAULT_AUTHENTICATED_ROUTE,
    }
}
