//! In-memory store for development and testing.
//!
//! Uses `DashMap` for concurrent access without external locks. Data is
//! lost on restart and not shared across processes.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{Account, Store, StoreError};
use crate::session::{Session, SessionWithUser, User};
use crate::types::Post;

#[derive(Default)]
pub struct InMemoryStore {
    users: DashMap<String, User>,
    /// Lower-cased email → user id.
    emails: DashMap<String, String>,
    /// User id → credential account.
    accounts: DashMap<String, Account>,
    /// Session token → session.
    sessions: DashMap<String, Session>,
    posts: DashMap<String, Post>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently stored (including expired).
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Overwrite a user record in place. For testing malformed data.
    pub fn put_user(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    /// Insert a session without any checks. For testing.
    pub fn put_session(&self, session: Session) {
        self.sessions.insert(session.token.clone(), session);
    }
}

impl Store for InMemoryStore {
    async fn create_user(&self, user: &User, account: &Account) -> Result<(), StoreError> {
        // The email entry acts as the uniqueness lock for the whole insert.
        match self.emails.entry(user.email.to_lowercase()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!("user {}", user.email))),
            Entry::Vacant(slot) => {
                self.users.insert(user.id.clone(), user.clone());
                self.accounts.insert(user.id.clone(), account.clone());
                slot.insert(user.id.clone());
                Ok(())
            }
        }
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<(User, Account)>, StoreError> {
        let Some(user_id) = self.emails.get(&email.to_lowercase()).map(|e| e.value().clone())
        else {
            return Ok(None);
        };

        let user = self.users.get(&user_id).map(|u| u.value().clone());
        let account = self.accounts.get(&user_id).map(|a| a.value().clone());
        Ok(user.zip(account))
    }

    async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        match self.sessions.entry(session.token.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict("session token".into())),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(())
            }
        }
    }

    async fn find_session(&self, token: &str) -> Result<Option<SessionWithUser>, StoreError> {
        let Some(session) = self.sessions.get(token).map(|s| s.value().clone()) else {
            return Ok(None);
        };
        let Some(user) = self.users.get(&session.user_id).map(|u| u.value().clone()) else {
            return Ok(None);
        };
        Ok(Some(SessionWithUser { session, user }))
    }

    async fn touch_session(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(mut session) = self.sessions.get_mut(token) {
            session.expires_at = expires_at;
            session.updated_at = updated_at;
        }
        Ok(())
    }

    async fn delete_session(&self, token: &str) -> Result<(), StoreError> {
        self.sessions.remove(token);
        Ok(())
    }

    async fn list_posts(&self, user_id: &str) -> Result<Vec<Post>, StoreError> {
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|p| p.created_by == user_id)
            .map(|p| p.value().clone())
            .collect();
        posts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(posts)
    }

    async fn find_post(&self, id: &str) -> Result<Option<Post>, StoreError> {
        Ok(self.posts.get(id).map(|p| p.value().clone()))
    }

    async fn create_post(&self, post: &Post) -> Result<(), StoreError> {
        self.posts.insert(post.id.clone(), post.clone());
        Ok(())
    }

    async fn delete_post(&self, id: &str, user_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .posts
            .remove_if(id, |_, post| post.created_by == user_id)
            .is_some())
    }
}
