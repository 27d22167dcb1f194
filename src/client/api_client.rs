//! Posts API client for server-side page loaders.
//!
//! Runs inside a page request and forwards that request's `Cookie` header
//! verbatim, so the API sees the same session as the page.

use axum::http::HeaderMap;
use reqwest::header::COOKIE;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::types::{CreatePostRequest, DeletePostRequest, Post};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("upstream request failed with status {status}")]
    UpstreamFetchFailed { status: u16, body: String },

    #[error("upstream request error: {0}")]
    Request(#[from] reqwest::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::UpstreamFetchFailed { status, .. } => Some(*status),
            ApiError::Request(e) => e.status().map(|s| s.as_u16()),
        }
    }

    /// The `error` field of a JSON error body, if the upstream sent one.
    pub fn message(&self) -> Option<String> {
        let ApiError::UpstreamFetchFailed { body, .. } = self else {
            return None;
        };
        serde_json::from_str::<serde_json::Value>(body)
            .ok()?
            .get("error")?
            .as_str()
            .map(String::from)
    }
}

/// The `Cookie` header of an incoming request, to forward upstream.
pub fn forwarded_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, server_url: &str, api_path: &str) -> Self {
        Self {
            http,
            base: format!(
                "{}{}/posts",
                server_url.trim_end_matches('/'),
                api_path.trim_end_matches('/')
            ),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    #[instrument(skip_all)]
    pub async fn posts_all(&self, cookie: Option<&str>) -> Result<Vec<Post>, ApiError> {
        let req = self.http.get(format!("{}/all", self.base));
        self.send(req, cookie).await
    }

    /// `Ok(None)` when the post does not exist.
    #[instrument(skip(self, cookie))]
    pub async fn posts_one(&self, cookie: Option<&str>, id: &str) -> Result<Option<Post>, ApiError> {
        let req = self
            .http
            .get(format!("{}/one/{}", self.base, urlencoding::encode(id)));
        match self.send(req, cookie).await {
            Ok(post) => Ok(Some(post)),
            Err(ApiError::UpstreamFetchFailed { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip_all)]
    pub async fn posts_create(
        &self,
        cookie: Option<&str>,
        request: &CreatePostRequest,
    ) -> Result<Post, ApiError> {
        let req = self
            .http
            .post(format!("{}/create", self.base))
            .json(request);
        self.send(req, cookie).await
    }

    #[instrument(skip(self, cookie))]
    pub async fn posts_delete(&self, cookie: Option<&str>, id: &str) -> Result<(), ApiError> {
        let req = self
            .http
            .post(format!("{}/delete", self.base))
            .json(&DeletePostRequest { id: id.to_string() });
        let _: serde_json::Value = self.send(req, cookie).await?;
        Ok(())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
        cookie: Option<&str>,
    ) -> Result<T, ApiError> {
        let req = match cookie {
            Some(cookie) => req.header(COOKIE, cookie),
            None => req,
        };
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "posts API request failed");
            return Err(ApiError::UpstreamFetchFailed {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header};

    #[test]
    fn test_base_url() {
        let client = ApiClient::new(reqwest::Client::new(), "http://localhost:3001/", "/api");
        assert_eq!(client.base(), "http://localhost:3001/api/posts");
    }

    #[test]
    fn test_forwarded_cookie() {
        let mut headers = HeaderMap::new();
        assert_eq!(forwarded_cookie(&headers), None);
        headers.insert(header::COOKIE, HeaderValue::from_static("a=1; b=2"));
        assert_eq!(forwarded_cookie(&headers), Some("a=1; b=2"));
    }

    #[test]
    fn test_error_message_from_body() {
        let err = ApiError::UpstreamFetchFailed {
            status: 400,
            body: r#"{"error":"Please enter at least 3 characters"}"#.into(),
        };
        assert_eq!(err.status(), Some(400));
        assert_eq!(
            err.message().as_deref(),
            Some("Please enter at least 3 characters")
        );

        let opaque = ApiError::UpstreamFetchFailed {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(opaque.message(), None);
    }
}
