//! Posts CRUD under `{api_path}/posts`. Every handler requires a session and
//! only ever sees the caller's own posts.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::AppState;
use crate::context::{QueryCache, post_key, posts_key};
use crate::error::AppError;
use crate::session::RequireSession;
use crate::store::Store;
use crate::types::{CreatePostRequest, DeletePostRequest, Post, SuccessResponse};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/all", get(all))
        .route("/one/{id}", get(one))
        .route("/create", post(create))
        .route("/delete", post(delete))
}

/// GET /all
async fn all(
    State(state): State<Arc<AppState>>,
    RequireSession(session): RequireSession,
) -> Result<Json<Vec<Post>>, AppError> {
    let posts = state.auth.store().list_posts(session.user_id()).await?;
    Ok(Json(posts))
}

/// GET /one/{id}
async fn one(
    State(state): State<Arc<AppState>>,
    RequireSession(session): RequireSession,
    Path(id): Path<String>,
) -> Result<Json<Post>, AppError> {
    state
        .auth
        .store()
        .find_post(&id)
        .await?
        .filter(|post| post.created_by == session.user_id())
        .map(Json)
        .ok_or(AppError::NotFound("Post"))
}

/// POST /create
async fn create(
    State(state): State<Arc<AppState>>,
    RequireSession(session): RequireSession,
    Json(body): Json<CreatePostRequest>,
) -> Result<Json<Post>, AppError> {
    body.validate().map_err(AppError::BadRequest)?;

    let post = Post {
        id: Uuid::now_v7().to_string(),
        title: body.title.trim().to_string(),
        content: body.content.trim().to_string(),
        created_by: session.user_id().to_string(),
        created_at: Utc::now(),
    };
    state.auth.store().create_post(&post).await?;
    invalidate_posts(&state.query_cache, session.user_id(), &post.id);

    tracing::info!(post_id = %post.id, user_id = %post.created_by, "post created");
    Ok(Json(post))
}

/// POST /delete
async fn delete(
    State(state): State<Arc<AppState>>,
    RequireSession(session): RequireSession,
    Json(body): Json<DeletePostRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state
        .auth
        .store()
        .delete_post(&body.id, session.user_id())
        .await?
    {
        return Err(AppError::NotFound("Post"));
    }
    invalidate_posts(&state.query_cache, session.user_id(), &body.id);

    tracing::info!(post_id = %body.id, user_id = %session.user_id(), "post deleted");
    Ok(Json(SuccessResponse { success: true }))
}

fn invalidate_posts(cache: &QueryCache, user_id: &str, post_id: &str) {
    cache.invalidate(&posts_key(user_id));
    cache.invalidate(&post_key(user_id, post_id));
}
