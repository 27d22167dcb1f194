//! Shared request/response DTOs for the auth wire endpoints and posts API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{Session, User};

pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 256;
pub const CONTENT_MIN: usize = 5;
pub const CONTENT_MAX: usize = 512;

/// POST {api}/auth/sign-up/email request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpEmail {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// POST {api}/auth/sign-in/email request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInEmail {
    pub email: String,
    pub password: String,
}

/// Sign-in / sign-up response. The session cookie travels in `Set-Cookie`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Result of a successful sign-in or sign-up inside the auth instance.
#[derive(Debug, Clone)]
pub struct AuthSuccess {
    pub session: Session,
    pub user: User,
}

/// Error body of the auth wire endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthErrorBody {
    pub code: String,
    pub message: String,
}

/// A post owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// POST {api}/posts/create request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
}

impl CreatePostRequest {
    /// Length limits on the trimmed title and content.
    pub fn validate(&self) -> Result<(), String> {
        let title = self.title.trim().chars().count();
        if title < TITLE_MIN {
            return Err(format!("Please enter at least {TITLE_MIN} characters"));
        }
        if title > TITLE_MAX {
            return Err(format!("Please enter no more than {TITLE_MAX} characters"));
        }

        let content = self.content.trim().chars().count();
        if content < CONTENT_MIN {
            return Err(format!("Please enter at least {CONTENT_MIN} characters"));
        }
        if content > CONTENT_MAX {
            return Err(format!("Please enter no more than {CONTENT_MAX} characters"));
        }
        Ok(())
    }
}

/// POST {api}/posts/delete request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePostRequest {
    pub id: String,
}

/// GET /health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
    pub auth_base_url: String,
}

/// Generic success response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_request(title: &str, content: &str) -> CreatePostRequest {
        CreatePostRequest {
            title: title.into(),
            content: content.into(),
        }
    }

    #[test]
    fn test_create_post_validation_bounds() {
        assert!(post_request("Hey", "Hello").validate().is_ok());
        assert!(post_request("Hi", "Hello world").validate().is_err());
        assert!(post_request("Title", "Hey").validate().is_err());
        assert!(post_request(&"t".repeat(257), "Hello world").validate().is_err());
        assert!(post_request("Title", &"c".repeat(513)).validate().is_err());
        assert!(post_request(&"t".repeat(256), &"c".repeat(512)).validate().is_ok());
    }

    #[test]
    fn test_validation_ignores_surrounding_whitespace() {
        let err = post_request("  ab  ", "Hello world").validate().unwrap_err();
        assert!(err.contains("at least 3"));
    }

    #[test]
    fn test_sign_up_deserialization() {
        let json = r#"{"name": "Jane", "email": "jane@example.com", "password": "password123"}"#;
        let req: SignUpEmail = serde_json::from_str(json).unwrap();
        assert_eq!(req.name, "Jane");
        assert_eq!(req.email, "jane@example.com");
    }

    #[test]
    fn test_post_serializes_camel_case() {
        let post = Post {
            id: "p1".into(),
            title: "Title".into(),
            content: "Content".into(),
            created_by: "u1".into(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["createdBy"], "u1");
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn test_health_response() {
        let resp = HealthResponse {
            status: "ok".into(),
            store: "memory".into(),
            auth_base_url: "http://localhost:3001/api/auth".into(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["store"], "memory");
    }
}
