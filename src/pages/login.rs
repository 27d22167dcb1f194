//! GET/POST /login (guest only) and POST /logout.

use axum::Form;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use minijinja::context;
use serde::Deserialize;
use std::sync::Arc;

use super::PageError;
use crate::AppState;
use crate::auth::RequestMeta;
use crate::context::{RouterContext, post_key, posts_key};
use crate::guard::safe_redirect_target;
use crate::types::{SignInEmail, SignUpEmail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    SignIn,
    SignUp,
}

impl Tab {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("signup") => Tab::SignUp,
            _ => Tab::SignIn,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Tab::SignIn => "signin",
            Tab::SignUp => "signup",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub tab: Option<String>,
    pub redirect: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub name: String,
    pub email: String,
    pub password: String,
    pub redirect: Option<String>,
}

struct LoginView<'a> {
    tab: Tab,
    redirect: Option<&'a str>,
    name: &'a str,
    email: &'a str,
    error: Option<String>,
}

fn render(state: &AppState, view: LoginView<'_>) -> Result<Html<String>, PageError> {
    let redirect = view.redirect.filter(|r| !r.is_empty());
    let suffix = redirect.map(|r| format!("redirect={}", urlencoding::encode(r)));
    let (signin_href, signup_href) = match &suffix {
        Some(s) => (format!("/login?{s}"), format!("/login?tab=signup&{s}")),
        None => ("/login".to_string(), "/login?tab=signup".to_string()),
    };

    state.templates.render(
        "login.html",
        context! {
            tab => view.tab.as_str(),
            redirect => redirect,
            signin_href => signin_href,
            signup_href => signup_href,
            name => view.name,
            email => view.email,
            error => view.error,
        },
    )
}

/// GET /login
pub async fn show(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LoginQuery>,
) -> Result<Html<String>, PageError> {
    render(
        &state,
        LoginView {
            tab: Tab::parse(query.tab.as_deref()),
            redirect: query.redirect.as_deref(),
            name: "",
            email: "",
            error: None,
        },
    )
}

/// POST /login
///
/// On success sets the session cookie and redirects to the requested local
/// path (or the dashboard). On failure re-renders the form with the error.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response, PageError> {
    let tab = Tab::parse(Some(form.mode.as_str()));
    let meta = RequestMeta::from_headers(&headers);

    let result = match tab {
        Tab::SignUp => {
            state
                .auth
                .sign_up_email(
                    SignUpEmail {
                        name: form.name.clone(),
                        email: form.email.clone(),
                        password: form.password,
                    },
                    &meta,
                )
                .await
        }
        Tab::SignIn => {
            state
                .auth
                .sign_in_email(
                    SignInEmail {
                        email: form.email.clone(),
                        password: form.password,
                    },
                    &meta,
                )
                .await
        }
    };

    match result {
        Ok(success) => {
            let target = safe_redirect_target(form.redirect.as_deref());
            let cookie = state.auth.session_cookie(&success.session.token);
            Ok(([(header::SET_COOKIE, cookie)], Redirect::to(target)).into_response())
        }
        Err(e) => {
            let status = e.status();
            let html = render(
                &state,
                LoginView {
                    tab,
                    redirect: form.redirect.as_deref(),
                    name: &form.name,
                    email: &form.email,
                    error: Some(e.public_message()),
                },
            )?;
            Ok((status, html).into_response())
        }
    }
}

/// POST /logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    ctx: RouterContext,
    headers: HeaderMap,
) -> Response {
    if let Err(e) = state.auth.sign_out(&headers).await {
        tracing::warn!("sign-out failed: {}", e);
    }
    if let Some(session) = &ctx.session {
        state
            .query_cache
            .invalidate_prefix(&posts_key(session.user_id()));
        state
            .query_cache
            .invalidate_prefix(&post_key(session.user_id(), ""));
    }

    (
        [(header::SET_COOKIE, state.auth.clear_session_cookie())],
        Redirect::to("/"),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_parse() {
        assert_eq!(Tab::parse(Some("signup")), Tab::SignUp);
        assert_eq!(Tab::parse(Some("signin")), Tab::SignIn);
        assert_eq!(Tab::parse(Some("other")), Tab::SignIn);
        assert_eq!(Tab::parse(None), Tab::SignIn);
    }
}
