//! Application error types with Axum response mapping.
//!
//! Each variant maps to a specific HTTP status + JSON body of the form
//! `{"error": "..."}`. Auth errors keep the `{code, message}` body of the
//! auth wire endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::auth::AuthError;
use crate::client::ApiError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    UpstreamFetchFailed(#[from] ApiError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Auth(err) => return err.into_response(),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, json!({"error": "Unauthorized"})),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({"error": msg})),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({"error": format!("{what} not found")}),
            ),
            AppError::Store(e) => {
                tracing::error!("store failure: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Something went wrong"}),
                )
            }
            AppError::UpstreamFetchFailed(e) => {
                tracing::error!("upstream fetch failed: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({"error": "Upstream request failed"}),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Something went wrong"}),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}
