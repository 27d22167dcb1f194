//! Session and user models plus the trust boundary between them and the
//! rest of the app.
//!
//! Raw `Session`/`User` pairs come out of the store. Everything downstream
//! (route context, pages, the posts API) only ever sees a `ValidSession`,
//! whose constructor rejects incomplete or expired sessions.

pub mod extract;
pub mod resolve;

pub use extract::RequireSession;
pub use resolve::{ResolvedSession, ensure_session, get_session, resolve_session};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One authenticated browser session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// Opaque bearer value carried (signed) in the session cookie.
    #[serde(default, skip_serializing)]
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An account holder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A session joined with its user, as loaded from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionWithUser {
    pub session: Session,
    pub user: User,
}

/// Why a loaded session was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionRejected {
    #[error("user id is empty")]
    MissingUserId,
    #[error("user email is empty")]
    MissingUserEmail,
    #[error("session id is empty")]
    MissingSessionId,
    #[error("session user id is empty")]
    MissingSessionUserId,
    #[error("session belongs to a different user")]
    UserMismatch,
    #[error("session has expired")]
    Expired,
}

/// A session that passed every structural and expiry check.
///
/// Fields are private: the only way to obtain one is `ValidSession::new`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidSession {
    session: Session,
    user: User,
}

impl ValidSession {
    /// Check required fields and expiry (`expires_at` strictly after `now`).
    pub fn new(raw: SessionWithUser, now: DateTime<Utc>) -> Result<Self, SessionRejected> {
        let SessionWithUser { session, user } = raw;

        if user.id.is_empty() {
            return Err(SessionRejected::MissingUserId);
        }
        if user.email.is_empty() {
            return Err(SessionRejected::MissingUserEmail);
        }
        if session.id.is_empty() {
            return Err(SessionRejected::MissingSessionId);
        }
        if session.user_id.is_empty() {
            return Err(SessionRejected::MissingSessionUserId);
        }
        if session.user_id != user.id {
            return Err(SessionRejected::UserMismatch);
        }
        if session.expires_at <= now {
            return Err(SessionRejected::Expired);
        }

        Ok(Self { session, user })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn email(&self) -> &str {
        &self.user.email
    }

    /// Name if the user set one, email otherwise.
    pub fn display_name(&self) -> &str {
        match self.user.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.user.email,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.session.expires_at
    }
}
