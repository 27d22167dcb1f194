//! Server entrypoint.
//!
//! Loads `.env`, validates configuration, builds the auth instance through
//! the provider and serves the app on `WWW_PORT`.

use std::env;
use std::process;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

use tstack_auth::auth::AuthProvider;
use tstack_auth::config::Config;
use tstack_auth::{AppState, create_app};

#[tokio::main]
async fn main() {
    // Load .env for local dev
    let _ = dotenvy::dotenv();

    // Init tracing: JSON when LOG_FORMAT=json, pretty otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).init();
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(key = e.key(), "invalid configuration: {}", e);
            process::exit(1);
        }
    };
    tracing::debug!(?config, "configuration loaded");

    let provider = AuthProvider::new();
    let auth = match provider
        .get_or_init(&config.database_url, config.auth_options())
        .await
    {
        Ok(auth) => auth,
        Err(e) => {
            tracing::error!("failed to initialize auth: {}", e);
            process::exit(1);
        }
    };

    let port = config.port;
    let state = match AppState::new(config, auth) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!("failed to load page templates: {}", e);
            process::exit(1);
        }
    };
    let app = create_app(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("failed to bind {}: {}", addr, e);
            process::exit(1);
        }
    };
    tracing::info!("Listening on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {}", e);
        process::exit(1);
    }
}
