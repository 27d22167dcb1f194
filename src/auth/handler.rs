//! Wire endpoints served under `{api_path}/auth`.

use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use serde_json::{Value, json};
use std::sync::Arc;

use super::{AuthError, AuthInstance, RequestMeta};
use crate::middleware::origin::require_trusted_origin;
use crate::session::{self, ValidSession};
use crate::types::{AuthResponse, AuthSuccess, SignInEmail, SignUpEmail, SuccessResponse};

pub(crate) fn routes<S>(auth: Arc<AuthInstance>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let mut router = Router::new()
        .route("/sign-up/email", post(sign_up_email))
        .route("/sign-in/email", post(sign_in_email))
        .route("/sign-out", post(sign_out))
        .route("/get-session", get(get_session))
        .route("/ok", get(ok));

    for plugin in &auth.options().plugins {
        router = plugin.extend(router);
    }

    router
        .layer(middleware::from_fn_with_state(
            auth.clone(),
            require_trusted_origin,
        ))
        .with_state(auth)
}

/// POST /sign-up/email
async fn sign_up_email(
    State(auth): State<Arc<AuthInstance>>,
    headers: HeaderMap,
    Json(body): Json<SignUpEmail>,
) -> Result<Response, AuthError> {
    let success = auth
        .sign_up_email(body, &RequestMeta::from_headers(&headers))
        .await?;
    Ok(signed_in(&auth, success))
}

/// POST /sign-in/email
async fn sign_in_email(
    State(auth): State<Arc<AuthInstance>>,
    headers: HeaderMap,
    Json(body): Json<SignInEmail>,
) -> Result<Response, AuthError> {
    let success = auth
        .sign_in_email(body, &RequestMeta::from_headers(&headers))
        .await?;
    Ok(signed_in(&auth, success))
}

/// POST /sign-out
async fn sign_out(
    State(auth): State<Arc<AuthInstance>>,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    auth.sign_out(&headers).await?;
    Ok((
        [(header::SET_COOKIE, auth.clear_session_cookie())],
        Json(SuccessResponse { success: true }),
    )
        .into_response())
}

/// GET /get-session
///
/// Re-issues the session cookie when the lookup extended the session.
async fn get_session(State(auth): State<Arc<AuthInstance>>, headers: HeaderMap) -> Response {
    let resolved = session::resolve_session(&auth, &headers).await;
    let body: Json<Option<ValidSession>> = Json(resolved.session);
    match resolved.refreshed_cookie {
        Some(cookie) => ([(header::SET_COOKIE, cookie)], body).into_response(),
        None => body.into_response(),
    }
}

/// GET /ok
async fn ok() -> Json<Value> {
    Json(json!({ "ok": true }))
}

fn signed_in(auth: &AuthInstance, success: AuthSuccess) -> Response {
    let cookie = auth.session_cookie(&success.session.token);
    let body = AuthResponse {
        token: success.session.token,
        user: success.user,
    };
    ([(header::SET_COOKIE, cookie)], Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::AnyStore;
    use crate::store::memory::InMemoryStore;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::StatusCode;

    fn instance() -> Arc<AuthInstance> {
        let store = Arc::new(AnyStore::Memory(InMemoryStore::new()));
        Arc::new(AuthInstance::new(store, Config::test_default().auth_options()).unwrap())
    }

    fn json_post(uri: &str, body: Value) -> Request {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ok_endpoint() {
        let auth = instance();
        let resp = auth
            .handle(Request::get("/ok").body(Body::empty()).unwrap())
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["ok"], true);
    }

    #[tokio::test]
    async fn test_sign_up_sets_cookie() {
        let auth = instance();
        let resp = auth
            .handle(json_post(
                "/sign-up/email",
                json!({"name": "Jane", "email": "jane@example.com", "password": "password123"}),
            ))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("tstack.session_token="));
        let body = body_json(resp).await;
        assert_eq!(body["user"]["email"], "jane@example.com");
        assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn test_get_session_without_cookie_is_null() {
        let auth = instance();
        let resp = auth
            .handle(Request::get("/get-session").body(Body::empty()).unwrap())
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_json(resp).await.is_null());
    }

    #[tokio::test]
    async fn test_untrusted_origin_rejected() {
        let auth = instance();
        let mut req = json_post(
            "/sign-in/email",
            json!({"email": "jane@example.com", "password": "password123"}),
        );
        req.headers_mut().insert(
            header::ORIGIN,
            "http://evil.example.com".parse().unwrap(),
        );
        let resp = auth.handle(req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(resp).await["code"], "INVALID_ORIGIN");
    }

    #[tokio::test]
    async fn test_trusted_origin_allowed() {
        let auth = instance();
        let mut req = json_post(
            "/sign-in/email",
            json!({"email": "jane@example.com", "password": "password123"}),
        );
        req.headers_mut()
            .insert(header::ORIGIN, "http://localhost:3000".parse().unwrap());
        let resp = auth.handle(req).await;
        // Passes the origin check, then fails on the unknown account.
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_open_api_plugin_mounted() {
        let auth = instance();
        let resp = auth
            .handle(
                Request::get("/open-api/generate-schema")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["openapi"], "3.1.0");
    }

    #[tokio::test]
    async fn test_get_session_renews_cookie_of_extended_session() {
        let auth = instance();
        let now = chrono::Utc::now();
        let mut raw = crate::session::tests::sample(now);
        raw.session.expires_at = now + chrono::Duration::days(5);
        let AnyStore::Memory(memory) = auth.store() else {
            unreachable!()
        };
        memory.put_user(raw.user.clone());
        memory.put_session(raw.session.clone());

        let signed = crate::auth::cookie::sign_token(
            auth.options().secret.as_bytes(),
            &raw.session.token,
        );
        let req = Request::get("/get-session")
            .header(header::COOKIE, format!("tstack.session_token={signed}"))
            .body(Body::empty())
            .unwrap();
        let resp = auth.handle(req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with(&format!("tstack.session_token={signed}")));
        assert!(cookie.contains("Max-Age=604800"));
        assert_eq!(body_json(resp).await["user"]["email"], "jane@example.com");
    }
}
