//! GET /health

use axum::Json;
use axum::extract::State;
use std::sync::Arc;

use crate::types::HealthResponse;

/// Health check: reports the store backend and the auth base URL.
pub async fn health(State(state): State<Arc<crate::AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        store: state.auth.store().kind().into(),
        auth_base_url: state.auth.base_url(),
    })
}
