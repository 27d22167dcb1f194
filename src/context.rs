//! Per-request router context and the process-wide query cache.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::AppError;
use crate::session::ValidSession;

/// How long a cached loader result is served before it is fetched again.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(30);

/// Cache key of a user's post list.
pub fn posts_key(user_id: &str) -> String {
    format!("posts.all:{user_id}")
}

/// Cache key of a single post as seen by a user.
pub fn post_key(user_id: &str, post_id: &str) -> String {
    format!("posts.one:{user_id}:{post_id}")
}

#[derive(Debug)]
struct CacheEntry {
    value: serde_json::Value,
    fetched_at: Instant,
}

/// Shared cache of loader results. Clones share the same map.
#[derive(Debug, Clone)]
pub struct QueryCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    stale_time: Duration,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_TIME)
    }
}

impl QueryCache {
    pub fn new(stale_time: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            stale_time,
        }
    }

    /// Fresh cached value for `key`, if any.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.entries.get(key)?;
        if entry.fetched_at.elapsed() >= self.stale_time {
            return None;
        }
        serde_json::from_value(entry.value.clone()).ok()
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.entries.insert(
                    key.to_string(),
                    CacheEntry {
                        value,
                        fetched_at: Instant::now(),
                    },
                );
            }
            Err(e) => tracing::warn!(key, "value not cacheable: {}", e),
        }
    }

    /// Serve `key` from cache, or run `loader` and cache its result.
    /// Errors are not cached.
    pub async fn fetch<T, E, F, Fut>(&self, key: &str, loader: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get(key) {
            tracing::debug!(key, "query cache hit");
            return Ok(hit);
        }
        let value = loader().await?;
        self.set(key, &value);
        Ok(value)
    }

    /// Like `fetch` for lookups that may find nothing. Only hits are cached.
    pub async fn fetch_optional<T, E, F, Fut>(&self, key: &str, loader: F) -> Result<Option<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        if let Some(hit) = self.get(key) {
            tracing::debug!(key, "query cache hit");
            return Ok(Some(hit));
        }
        let value = loader().await?;
        if let Some(found) = &value {
            self.set(key, found);
        }
        Ok(value)
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every entry whose key starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-request context: the resolved session (if any) and the query cache.
///
/// Inserted into request extensions by the `attach_context` middleware.
#[derive(Debug, Clone)]
pub struct RouterContext {
    pub session: Option<ValidSession>,
    pub query_cache: QueryCache,
}

impl RouterContext {
    pub fn new(session: Option<ValidSession>, query_cache: QueryCache) -> Self {
        Self {
            session,
            query_cache,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

impl<S> FromRequestParts<S> for RouterContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RouterContext>()
            .cloned()
            .ok_or(AppError::Internal("Router context middleware not configured".into()))
    }
}
