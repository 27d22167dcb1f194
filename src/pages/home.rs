//! GET /

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
    state
        .templates
        .render("home.html", context! { user_name => user_name(&ctx) })
}
