//! Test utilities: test app builder, live server, sign-up helper and
//! direct session seeding.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use axum::response::Response;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use tstack_auth::auth::AuthInstance;
use tstack_auth::auth::cookie::{COOKIE_NAME, sign_token};
use tstack_auth::config::Config;
use tstack_auth::session::{Session, SessionWithUser, User};
use tstack_auth::store::AnyStore;
use tstack_auth::store::memory::InMemoryStore;
use tstack_auth::{AppState, create_app};

pub const PASSWORD: &str = "password123";

/// Build a test app with the in-memory store and default test config.
pub fn build_test_app() -> (Router, Arc<AppState>) {
    build_test_app_with_config(Config::test_default())
}

/// Build a test app with a custom Config and the in-memory store.
pub fn build_test_app_with_config(config: Config) -> (Router, Arc<AppState>) {
    let store = Arc::new(AnyStore::Memory(InMemoryStore::new()));
    let auth = Arc::new(AuthInstance::new(store, config.auth_options()).unwrap());
    let state = Arc::new(AppState::new(config, auth).unwrap());
    let app = create_app(state.clone());
    (app, state)
}

/// The app served on an ephemeral port. Pages call back into the posts API
/// over HTTP, so their tests need a real listener.
pub struct TestServer {
    pub base_url: String,
    pub state: Arc<AppState>,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn spawn_app() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = Config::test_default();
    config.server_url = format!("http://{addr}");
    let (app, state) = build_test_app_with_config(config);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{addr}"),
        state,
        handle,
    }
}

/// HTTP client that does not follow redirects and keeps no cookies.
pub fn raw_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

pub fn json_post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn form_post(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        req = req.header(header::COOKIE, cookie);
    }
    req.body(Body::empty()).unwrap()
}

/// The `name=value` pair of the session cookie set by a response.
pub fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|s| s.split(';').next())
        .find(|pair| pair.starts_with(&format!("{COOKIE_NAME}=")))
        .map(String::from)
}

pub fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

/// Sign up through the wire endpoint, returning the session cookie pair.
pub async fn sign_up(app: &Router, name: &str, email: &str) -> String {
    let body = json!({ "name": name, "email": email, "password": PASSWORD });
    let response = app
        .clone()
        .oneshot(json_post("/api/auth/sign-up/email", &body))
        .await
        .unwrap();
    assert!(response.status().is_success(), "sign-up failed: {}", response.status());
    session_cookie(&response).expect("sign-up sets the session cookie")
}

/// A complete session/user pair for seeding.
pub fn sample_session(now: DateTime<Utc>) -> SessionWithUser {
    SessionWithUser {
        session: Session {
            id: "sess-seeded".into(),
            token: "tok-seeded".into(),
            user_id: "user-seeded".into(),
            expires_at: now + Duration::hours(1),
            ip_address: None,
            user_agent: None,
            created_at: now,
            updated_at: now,
        },
        user: User {
            id: "user-seeded".into(),
            email: "seeded@example.com".into(),
            name: Some("Seeded".into()),
            email_verified: false,
            created_at: now,
            updated_at: now,
        },
    }
}

/// Store a session directly, bypassing sign-up. Returns the cookie pair.
pub fn seed_session(state: &AppState, raw: &SessionWithUser) -> String {
    let AnyStore::Memory(memory) = state.auth.store() else {
        panic!("tests use the in-memory store");
    };
    memory.put_user(raw.user.clone());
    memory.put_session(raw.session.clone());

    let signed = sign_token(state.config.auth_secret.as_bytes(), &raw.session.token);
    format!("{COOKIE_NAME}={signed}")
}
