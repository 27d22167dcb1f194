//! PostgreSQL store for deployments.
//!
//! Tables:
//! - `users`: account holders, unique lower-cased `email`
//! - `accounts`: credential accounts (`provider_id = 'credential'`)
//! - `sessions`: keyed by unique `token`, `expires_at` for expiry
//! - `posts`: owned by `created_by`

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, error, instrument};

use super::{Account, Store, StoreError};
use crate::session::{Session, SessionWithUser, User};
use crate::types::Post;

const MAX_CONNECTIONS: u32 = 10;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        name TEXT,
        email_verified BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        provider_id TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        UNIQUE (user_id, provider_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        token TEXT NOT NULL UNIQUE,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        expires_at TIMESTAMPTZ NOT NULL,
        ip_address TEXT,
        user_agent TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        created_by TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS posts_created_by_idx ON posts (created_by, created_at)",
];

/// PostgreSQL store over a shared connection pool.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool and make sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .map_err(db_error("connect"))?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db_error("migrate"))?;
        }
        debug!("postgres schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_error(operation: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| {
        if let sqlx::Error::Database(ref db) = e
            && db.is_unique_violation()
        {
            return StoreError::Conflict(operation.into());
        }
        error!("postgres {} failed: {}", operation, e);
        StoreError::Database(e.to_string())
    }
}

fn user_from_row(row: &PgRow, prefix: &str) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get(format!("{prefix}id").as_str())?,
        email: row.try_get(format!("{prefix}email").as_str())?,
        name: row.try_get(format!("{prefix}name").as_str())?,
        email_verified: row.try_get(format!("{prefix}email_verified").as_str())?,
        created_at: row.try_get(format!("{prefix}created_at").as_str())?,
        updated_at: row.try_get(format!("{prefix}updated_at").as_str())?,
    })
}

fn post_from_row(row: &PgRow) -> Result<Post, sqlx::Error> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
    })
}

impl Store for PostgresStore {
    #[instrument(skip(self, user, account), fields(user_id = %user.id))]
    async fn create_user(&self, user: &User, account: &Account) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin"))?;

        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, email_verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&user.id)
        .bind(user.email.to_lowercase())
        .bind(&user.name)
        .bind(user.email_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("create user"))?;

        sqlx::query(
            r#"
            INSERT INTO accounts (id, user_id, provider_id, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&account.id)
        .bind(&account.user_id)
        .bind(&account.provider_id)
        .bind(&account.password_hash)
        .bind(account.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error("create account"))?;

        tx.commit().await.map_err(db_error("commit"))?;
        Ok(())
    }

    #[instrument(skip(self, email))]
    async fn find_credentials(&self, email: &str) -> Result<Option<(User, Account)>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT u.id, u.email, u.name, u.email_verified, u.created_at, u.updated_at,
                   a.id AS account_id, a.provider_id, a.password_hash,
                   a.created_at AS account_created_at
            FROM users u
            JOIN accounts a ON a.user_id = u.id AND a.provider_id = $2
            WHERE u.email = $1
            "#,
        )
        .bind(email.to_lowercase())
        .bind(super::CREDENTIAL_PROVIDER)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find credentials"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let decode = || -> Result<(User, Account), sqlx::Error> {
            let user = user_from_row(&row, "")?;
            let account = Account {
                id: row.try_get("account_id")?,
                user_id: user.id.clone(),
                provider_id: row.try_get("provider_id")?,
                password_hash: row.try_get("password_hash")?,
                created_at: row.try_get("account_created_at")?,
            };
            Ok((user, account))
        };
        decode().map(Some).map_err(db_error("decode credentials"))
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sessions
                (id, token, user_id, expires_at, ip_address, user_agent, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&session.id)
        .bind(&session.token)
        .bind(&session.user_id)
        .bind(session.expires_at)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("create session"))?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn find_session(&self, token: &str) -> Result<Option<SessionWithUser>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT s.id AS s_id, s.token AS s_token, s.user_id AS s_user_id,
                   s.expires_at AS s_expires_at, s.ip_address AS s_ip_address,
                   s.user_agent AS s_user_agent, s.created_at AS s_created_at,
                   s.updated_at AS s_updated_at,
                   u.id AS u_id, u.email AS u_email, u.name AS u_name,
                   u.email_verified AS u_email_verified, u.created_at AS u_created_at,
                   u.updated_at AS u_updated_at
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find session"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let decode = || -> Result<SessionWithUser, sqlx::Error> {
            let session = Session {
                id: row.try_get("s_id")?,
                token: row.try_get("s_token")?,
                user_id: row.try_get("s_user_id")?,
                expires_at: row.try_get("s_expires_at")?,
                ip_address: row.try_get("s_ip_address")?,
                user_agent: row.try_get("s_user_agent")?,
                created_at: row.try_get("s_created_at")?,
                updated_at: row.try_get("s_updated_at")?,
            };
            let user = user_from_row(&row, "u_")?;
            Ok(SessionWithUser { session, user })
        };
        decode().map(Some).map_err(db_error("decode session"))
    }

    #[instrument(skip_all)]
    async fn touch_session(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE sessions SET expires_at = $2, updated_at = $3 WHERE token = $1")
            .bind(token)
            .bind(expires_at)
            .bind(updated_at)
            .execute(&self.pool)
            .await
            .map_err(db_error("touch session"))?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn delete_session(&self, token: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete session"))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_posts(&self, user_id: &str) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, content, created_by, created_at
            FROM posts
            WHERE created_by = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list posts"))?;

        rows.iter()
            .map(post_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error("decode posts"))
    }

    #[instrument(skip(self))]
    async fn find_post(&self, id: &str) -> Result<Option<Post>, StoreError> {
        let row = sqlx::query(
            "SELECT id, title, content, created_by, created_at FROM posts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find post"))?;

        row.as_ref()
            .map(post_from_row)
            .transpose()
            .map_err(db_error("decode post"))
    }

    #[instrument(skip(self, post), fields(post_id = %post.id))]
    async fn create_post(&self, post: &Post) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, title, content, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&post.id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.created_by)
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("create post"))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_post(&self, id: &str, user_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND created_by = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete post"))?;
        Ok(result.rows_affected() > 0)
    }
}
