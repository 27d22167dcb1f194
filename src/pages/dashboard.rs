//! GET /dashboard (protected)

use axum::extract::State;
use axum::response::Html;
use minijinja::context;
use std::sync::Arc;

use super::{PageError, user_name};
use crate::AppState;
use crate::context::RouterContext;

pub async fn show(
    State(state): State<Arc<AppState>>,
    ctx: RouterContext,
) -> Result<Html<String>, PageError> {
    let email = ctx.session.as_ref().map(|s| s.email());
    let expires_at = ctx
        .session
        .as_ref()
        .map(|s| s.expires_at().format("%Y-%m-%d %H:%M UTC").to_string());

    state.templates.render(
        "dashboard.html",
        context! {
            user_name => user_name(&ctx),
            email => email,
            expires_at => expires_at,
        },
    )
}
