//! TStack Auth: session-based email/password authentication, route guards,
//! server-rendered pages and a posts CRUD API in one Axum service.

pub mod auth;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod guard;
pub mod middleware;
pub mod ocsf;
pub mod pages;
pub mod routes;
pub mod session;
pub mod store;
pub mod types;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::AuthInstance;
use crate::client::ApiClient;
use crate::config::Config;
use crate::context::QueryCache;
use crate::middleware::guard::attach_context;
use crate::middleware::origin::require_trusted_page_origin;
use crate::pages::Templates;

/// Shared application state available to all route handlers.
pub struct AppState {
    pub config: Config,
    pub auth: Arc<AuthInstance>,
    pub api: ApiClient,
    pub query_cache: QueryCache,
    pub templates: Templates,
}

impl AppState {
    pub fn new(config: Config, auth: Arc<AuthInstance>) -> Result<Self, minijinja::Error> {
        let api = ApiClient::new(reqwest::Client::new(), &config.server_url, &config.api_path);
        Ok(Self {
            config,
            auth,
            api,
            query_cache: QueryCache::default(),
            templates: Templates::new()?,
        })
    }
}

/// Build the Axum router with all middleware and routes.
pub fn create_app(state: Arc<AppState>) -> Router {
    // CORS: trusted origins only, with credentials
    let origins: Vec<HeaderValue> = state
        .auth
        .options()
        .trusted_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    // The auth endpoints carry their own origin check.
    let api = Router::new()
        .nest("/posts", routes::posts::router())
        .layer(from_fn_with_state(state.clone(), require_trusted_page_origin))
        .nest("/auth", state.auth.router());

    Router::new()
        .route("/health", get(routes::health::health))
        .merge(pages::router(&state))
        .layer(from_fn_with_state(state.clone(), require_trusted_page_origin))
        .nest(&state.config.api_path, api)
        .layer(from_fn_with_state(state.clone(), attach_context))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
