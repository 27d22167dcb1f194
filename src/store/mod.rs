//! Persistence for users, credential accounts, sessions and posts.
//!
//! Provides the `Store` trait for pluggable storage, an in-memory backend
//! for development/testing and a PostgreSQL backend for deployments.

pub mod memory;
pub mod postgres;

use chrono::{DateTime, Utc};

use crate::session::{Session, SessionWithUser, User};
use crate::types::Post;

/// Provider id of email/password accounts.
pub const CREDENTIAL_PROVIDER: &str = "credential";

/// Credential account linking a user to a password hash.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: String,
    pub user_id: String,
    pub provider_id: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),
}

/// Pluggable storage backend.
///
/// Implementations must be `Send + Sync` for use in Axum's async handlers.
pub trait Store: Send + Sync {
    /// Insert a user and its credential account. `Conflict` if the email is taken.
    fn create_user(
        &self,
        user: &User,
        account: &Account,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Look up a user (by lower-cased email) with its credential account.
    fn find_credentials(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<(User, Account)>, StoreError>> + Send;

    fn create_session(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Load a session by token, joined with its user.
    fn find_session(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Option<SessionWithUser>, StoreError>> + Send;

    /// Slide a session's expiry forward.
    fn touch_session(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete a session. Deleting an unknown token is a no-op.
    fn delete_session(&self, token: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Posts created by `user_id`, oldest first.
    fn list_posts(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<Post>, StoreError>> + Send;

    fn find_post(&self, id: &str) -> impl Future<Output = Result<Option<Post>, StoreError>> + Send;

    fn create_post(&self, post: &Post) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete a post owned by `user_id`. Returns whether a post was removed.
    fn delete_post(
        &self,
        id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// Type-erased store supporting both InMemory and PostgreSQL.
///
/// Since `Store` uses RPITIT, it's not object-safe. This enum
/// dispatches manually instead.
pub enum AnyStore {
    Memory(memory::InMemoryStore),
    Postgres(postgres::PostgresStore),
}

impl AnyStore {
    /// Short backend name, reported by `/health`.
    pub fn kind(&self) -> &'static str {
        match self {
            AnyStore::Memory(_) => "memory",
            AnyStore::Postgres(_) => "postgres",
        }
    }
}

impl Store for AnyStore {
    async fn create_user(&self, user: &User, account: &Account) -> Result<(), StoreError> {
        match self {
            AnyStore::Memory(s) => s.create_user(user, account).await,
            AnyStore::Postgres(s) => s.create_user(user, account).await,
        }
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<(User, Account)>, StoreError> {
        match self {
            AnyStore::Memory(s) => s.find_credentials(email).await,
            AnyStore::Postgres(s) => s.find_credentials(email).await,
        }
    }

    async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        match self {
            AnyStore::Memory(s) => s.create_session(session).await,
            AnyStore::Postgres(s) => s.create_session(session).await,
        }
    }

    async fn find_session(&self, token: &str) -> Result<Option<SessionWithUser>, StoreError> {
        match self {
            AnyStore::Memory(s) => s.find_session(token).await,
            AnyStore::Postgres(s) => s.find_session(token).await,
        }
    }

    async fn touch_session(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        match self {
            AnyStore::Memory(s) => s.touch_session(token, expires_at, updated_at).await,
            AnyStore::Postgres(s) => s.touch_session(token, expires_at, updated_at).await,
        }
    }

    async fn delete_session(&self, token: &str) -> Result<(), StoreError> {
        match self {
            AnyStore::Memory(s) => s.delete_session(token).await,
            AnyStore::Postgres(s) => s.delete_session(token).await,
        }
    }

    async fn list_posts(&self, user_id: &str) -> Result<Vec<Post>, StoreError> {
        match self {
            AnyStore::Memory(s) => s.list_posts(user_id).await,
            AnyStore::Postgres(s) => s.list_posts(user_id).await,
        }
    }

    async fn find_post(&self, id: &str) -> Result<Option<Post>, StoreError> {
        match self {
            AnyStore::Memory(s) => s.find_post(id).await,
            AnyStore::Postgres(s) => s.find_post(id).await,
        }
    }

    async fn create_post(&self, post: &Post) -> Result<(), StoreError> {
        match self {
            AnyStore::Memory(s) => s.create_post(post).await,
            AnyStore::Postgres(s) => s.create_post(post).await,
        }
    }

    async fn delete_post(&self, id: &str, user_id: &str) -> Result<bool, StoreError> {
        match self {
            AnyStore::Memory(s) => s.delete_post(id, user_id).await,
            AnyStore::Postgres(s) => s.delete_post(id, user_id).await,
        }
    }
}
