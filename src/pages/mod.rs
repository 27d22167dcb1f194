//! Server-rendered pages.
//!
//! Templates live in `templates/` and are compiled into the binary.
//! Rendering auto-escapes every interpolated value.

pub mod dashboard;
pub mod home;
pub mod login;
pub mod posts;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use minijinja::Environment;
use std::sync::Arc;

use crate::AppState;
use crate::client::ApiError;
use crate::context::RouterContext;
use crate::middleware::guard::{redirect_authenticated, require_session};

const TEMPLATES: &[(&str, &str)] = &[
    ("layout.html", include_str!("templates/layout.html")),
    ("home.html", include_str!("templates/home.html")),
    ("login.html", include_str!("templates/login.html")),
    ("dashboard.html", include_str!("templates/dashboard.html")),
    ("posts.html", include_str!("templates/posts.html")),
    ("post.html", include_str!("templates/post.html")),
    ("not_found.html", include_str!("templates/not_found.html")),
];

/// Shown whenever a page cannot be rendered. Carries no request data.
const ERROR_BOUNDARY: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Something went wrong</title></head>
<body>
  <main>
    <h1>Something went wrong</h1>
    <p>We could not load this page. Please try again.</p>
    <p><a href="/">Back to home</a></p>
  </main>
</body>
</html>
"#;

pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    pub fn render(&self, name: &str, ctx: minijinja::Value) -> Result<Html<String>, PageError> {
        Ok(Html(self.env.get_template(name)?.render(ctx)?))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error(transparent)]
    Upstream(#[from] ApiError),

    #[error("template error: {0}")]
    Render(#[from] minijinja::Error),
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = match self {
            PageError::Upstream(_) => StatusCode::BAD_GATEWAY,
            PageError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!("page failed: {}", self);
        (status, Html(ERROR_BOUNDARY)).into_response()
    }
}

/// Header greeting: the user's name, falling back to the email.
pub(crate) fn user_name(ctx: &RouterContext) -> Option<&str> {
    ctx.session.as_ref().map(|s| s.display_name())
}

pub fn router(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/dashboard", get(dashboard::show))
        .route("/posts", get(posts::list).post(posts::create))
        .route("/posts/{id}", get(posts::show))
        .route("/posts/{id}/delete", post(posts::delete))
        .route_layer(from_fn_with_state(state.clone(), require_session));

    let guest_only = Router::new()
        .route("/login", get(login::show).post(login::submit))
        .route_layer(from_fn(redirect_authenticated));

    Router::new()
        .route("/", get(home::show))
        .route("/logout", post(login::logout))
        .merge(protected)
        .merge(guest_only)
}
