//! Outbound HTTP clients: the auth client and the cookie-forwarding posts
//! API client used by the pages.

pub mod api_client;
pub mod auth_client;

pub use api_client::{ApiClient, ApiError, forwarded_cookie};
pub use auth_client::{AuthClient, AuthClientError, AuthClientOptions, SessionState};
