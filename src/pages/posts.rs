//! Posts pages (protected). Data comes from the posts API through the
//! cookie-forwarding `ApiClient`, cached per user in the query cache.

use axum::Form;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use minijinja::context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{PageError, user_name};
use crate::AppState;
use crate::client::{ApiError, forwarded_cookie};
use crate::context::{RouterContext, post_key, posts_key};
use crate::types::{CreatePostRequest, Post};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Anything other than `asc` sorts newest first.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if s.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostsQuery {
    pub search_string: Option<String>,
    pub sort_direction: Option<String>,
}

#[derive(Debug, Serialize)]
struct PostView {
    id: String,
    title: String,
    content: String,
    created_at: String,
    created_at_display: String,
}

impl From<Post> for PostView {
    fn from(post: Post) -> Self {
        Self {
            created_at: post.created_at.to_rfc3339(),
            created_at_display: post.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            id: post.id,
            title: post.title,
            content: post.content,
        }
    }
}

/// Case-insensitive title filter followed by a stable sort on creation time.
pub fn visible_posts(
    mut posts: Vec<Post>,
    search: Option<&str>,
    direction: SortDirection,
) -> Vec<Post> {
    if let Some(needle) = search.map(str::trim).filter(|s| !s.is_empty()) {
        let needle = needle.to_lowercase();
        posts.retain(|p| p.title.to_lowercase().contains(&needle));
    }
    match direction {
        SortDirection::Asc => posts.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        SortDirection::Desc => posts.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
    posts
}

fn session_user(ctx: &RouterContext) -> &str {
    ctx.session.as_ref().map_or("", |s| s.user_id())
}

async fn load_posts(
    state: &AppState,
    ctx: &RouterContext,
    headers: &HeaderMap,
) -> Result<Vec<Post>, ApiError> {
    let cookie = forwarded_cookie(headers);
    ctx.query_cache
        .fetch(&posts_key(session_user(ctx)), || state.api.posts_all(cookie))
        .await
}

struct ListView<'a> {
    query: &'a PostsQuery,
    title: &'a str,
    content: &'a str,
    error: Option<String>,
}

async fn render_list(
    state: &AppState,
    ctx: &RouterContext,
    headers: &HeaderMap,
    view: ListView<'_>,
) -> Result<Html<String>, PageError> {
    let direction = SortDirection::parse(view.query.sort_direction.as_deref());
    let search = view.query.search_string.as_deref().unwrap_or("");
    let posts: Vec<PostView> = visible_posts(load_posts(state, ctx, headers).await?, Some(search), direction)
        .into_iter()
        .map(PostView::from)
        .collect();

    state.templates.render(
        "posts.html",
        context! {
            user_name => user_name(ctx),
            posts => posts,
            search_string => search,
            sort_direction => direction.as_str(),
            title => view.title,
            content => view.content,
            error => view.error,
        },
    )
}

/// GET /posts
pub async fn list(
    State(state): State<Arc<AppState>>,
    ctx: RouterContext,
    headers: HeaderMap,
    Query(query): Query<PostsQuery>,
) -> Result<Html<String>, PageError> {
    render_list(
        &state,
        &ctx,
        &headers,
        ListView {
            query: &query,
            title: "",
            content: "",
            error: None,
        },
    )
    .await
}

/// POST /posts
pub async fn create(
    State(state): State<Arc<AppState>>,
    ctx: RouterContext,
    headers: HeaderMap,
    Form(form): Form<CreatePostRequest>,
) -> Result<Response, PageError> {
    let error = match form.validate() {
        Err(message) => Some(message),
        Ok(()) => match state.api.posts_create(forwarded_cookie(&headers), &form).await {
            Ok(_) => return Ok(Redirect::to("/posts").into_response()),
            Err(e @ ApiError::UpstreamFetchFailed { status: 400, .. }) => {
                Some(e.message().unwrap_or_else(|| "Invalid post".into()))
            }
            Err(e) => return Err(e.into()),
        },
    };

    let html = render_list(
        &state,
        &ctx,
        &headers,
        ListView {
            query: &PostsQuery::default(),
            title: &form.title,
            content: &form.content,
            error,
        },
    )
    .await?;
    Ok((StatusCode::BAD_REQUEST, html).into_response())
}

/// POST /posts/{id}/delete
pub async fn delete(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Redirect, PageError> {
    match state.api.posts_delete(forwarded_cookie(&headers), &id).await {
        Ok(()) | Err(ApiError::UpstreamFetchFailed { status: 404, .. }) => {
            Ok(Redirect::to("/posts"))
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /posts/{id}
pub async fn show(
    State(state): State<Arc<AppState>>,
    ctx: RouterContext,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let cookie = forwarded_cookie(&headers);
    let post = ctx
        .query_cache
        .fetch_optional(&post_key(session_user(&ctx), &id), || {
            state.api.posts_one(cookie, &id)
        })
        .await?;

    match post {
        Some(post) => {
            let html = state.templates.render(
                "post.html",
                context! {
                    user_name => user_name(&ctx),
                    post => PostView::from(post),
                },
            )?;
            Ok(html.into_response())
        }
        None => {
            let html = state.templates.render(
                "not_found.html",
                context! {
                    user_name => user_name(&ctx),
                    what => "Post",
                    back_href => "/posts",
                },
            )?;
            Ok((StatusCode::NOT_FOUND, html).into_response())
        }
    }
}
