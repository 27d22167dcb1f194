//! Memoizing factory for auth instances.
//!
//! Building an instance opens a database connection. The provider hands out
//! the same `Arc<AuthInstance>` for identical options so repeated calls share
//! one pool.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::{AuthError, AuthInstance, AuthOptions};
use crate::store::AnyStore;
use crate::store::memory::InMemoryStore;
use crate::store::postgres::PostgresStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InstanceKey {
    database_url: String,
    server_url: String,
    api_path: String,
    secret: String,
    trusted_origins: Vec<String>,
    plugins: Vec<&'static str>,
    session_ttl_secs: i64,
    session_update_age_secs: i64,
    https_only: bool,
    cookie_domain: Option<String>,
}

impl InstanceKey {
    /// Credentials only enter the key as digests.
    fn new(database_url: &str, options: &AuthOptions) -> Self {
        Self {
            database_url: digest(database_url),
            server_url: options.server_url.clone(),
            api_path: options.api_path.clone(),
            secret: digest(&options.secret),
            trusted_origins: options.trusted_origins.clone(),
            plugins: options.plugins.iter().map(|p| p.id()).collect(),
            session_ttl_secs: options.session_ttl.num_seconds(),
            session_update_age_secs: options.session_update_age.num_seconds(),
            https_only: options.https_only,
            cookie_domain: options.cookie_domain.clone(),
        }
    }
}

fn digest(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

#[derive(Default)]
pub struct AuthProvider {
    instances: Mutex<HashMap<InstanceKey, Arc<AuthInstance>>>,
    connections: AtomicUsize,
}

impl AuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the instance for these options, building it on first use.
    ///
    /// Options are validated before any connection is opened.
    pub async fn get_or_init(
        &self,
        database_url: &str,
        options: AuthOptions,
    ) -> Result<Arc<AuthInstance>, AuthError> {
        AuthInstance::validate(&options)?;

        let key = InstanceKey::new(database_url, &options);
        let mut instances = self.instances.lock().await;
        if let Some(existing) = instances.get(&key) {
            tracing::debug!("reusing auth instance");
            return Ok(existing.clone());
        }

        let store = self.connect(database_url).await?;
        let instance = Arc::new(AuthInstance::new(Arc::new(store), options)?);
        tracing::info!(
            base_url = %instance.base_url(),
            store = instance.store().kind(),
            "auth instance created"
        );
        instances.insert(key, instance.clone());
        Ok(instance)
    }

    /// Number of database connections opened so far.
    pub fn connections_opened(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    async fn connect(&self, database_url: &str) -> Result<AnyStore, AuthError> {
        let scheme = database_url.split_once(':').map_or("", |(s, _)| s);
        let store = match scheme {
            "memory" => AnyStore::Memory(InMemoryStore::new()),
            "postgres" | "postgresql" => {
                AnyStore::Postgres(PostgresStore::connect(database_url).await?)
            }
            other => return Err(AuthError::UnsupportedDatabase(other.to_string())),
        };
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_identical_options_share_instance() {
        let provider = AuthProvider::new();
        let opts = Config::test_default().auth_options();

        let a = provider.get_or_init("memory://", opts.clone()).await.unwrap();
        let b = provider.get_or_init("memory://", opts).await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(provider.connections_opened(), 1);
    }

    #[tokio::test]
    async fn test_different_secret_builds_new_instance() {
        let provider = AuthProvider::new();
        let opts = Config::test_default().auth_options();
        let mut other = opts.clone();
        other.secret = "another-secret-that-is-long-enough-4567".into();

        let a = provider.get_or_init("memory://", opts).await.unwrap();
        let b = provider.get_or_init("memory://", other).await.unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(provider.connections_opened(), 2);
    }

    #[tokio::test]
    async fn test_invalid_options_open_no_connection() {
        let provider = AuthProvider::new();
        let mut opts = Config::test_default().auth_options();
        opts.secret = "short".into();

        let err = provider.get_or_init("memory://", opts).await.err().unwrap();
        assert!(matches!(err, AuthError::SecretTooShort));
        assert_eq!(provider.connections_opened(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_database() {
        let provider = AuthProvider::new();
        let opts = Config::test_default().auth_options();
        let err = provider
            .get_or_init("mysql://localhost/db", opts)
            .await
            .err().unwrap();
        assert!(matches!(err, AuthError::UnsupportedDatabase(s) if s == "mysql"));
    }

    #[test]
    fn test_key_hides_secret() {
        let opts = Config::test_default().auth_options();
        let key = InstanceKey::new("postgres://user:pw@host/db", &opts);
        let rendered = format!("{key:?}");
        assert!(!rendered.contains(&opts.secret));
        assert!(!rendered.contains("pw@host"));
    }
}
