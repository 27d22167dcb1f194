//! Application configuration via environment variables.
//!
//! Validated once at startup; any invalid value aborts the process with an
//! error naming the offending key.

use std::env;
use std::fmt;

use chrono::Duration;
use url::Url;

use crate::auth::AuthOptions;
use crate::auth::plugin::OpenApiPlugin;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_API_PATH: &str = "/api";
const MIN_SECRET_LEN: usize = 32;

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub auth_secret: String,
    pub web_url: String,
    pub server_url: String,
    pub api_path: String,
    pub port: u16,
    pub trusted_origins: Vec<String>,
    pub session_https_only: bool,
    pub cookie_domain: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"<redacted>")
            .field("auth_secret", &"<redacted>")
            .field("web_url", &self.web_url)
            .field("server_url", &self.server_url)
            .field("api_path", &self.api_path)
            .field("port", &self.port)
            .field("trusted_origins", &self.trusted_origins)
            .field("session_https_only", &self.session_https_only)
            .field("cookie_domain", &self.cookie_domain)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Validate configuration from an arbitrary key lookup.
    ///
    /// Required: `DB_POSTGRES_URL`, `SERVER_AUTH_SECRET` (or
    /// `BETTER_AUTH_SECRET`), `PUBLIC_WEB_URL`, `PUBLIC_SERVER_URL`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = required(&lookup, "DB_POSTGRES_URL")?;

        let (secret_key, auth_secret) = match lookup("SERVER_AUTH_SECRET") {
            Some(v) => ("SERVER_AUTH_SECRET", v),
            None => (
                "BETTER_AUTH_SECRET",
                required(&lookup, "BETTER_AUTH_SECRET")
                    .map_err(|_| ConfigError::Missing("SERVER_AUTH_SECRET".into()))?,
            ),
        };
        if auth_secret.chars().count() < MIN_SECRET_LEN {
            return Err(ConfigError::invalid(
                secret_key,
                format!("must be at least {MIN_SECRET_LEN} characters"),
            ));
        }

        let web_url = parse_url("PUBLIC_WEB_URL", &required(&lookup, "PUBLIC_WEB_URL")?)?;
        let server_url =
            parse_url("PUBLIC_SERVER_URL", &required(&lookup, "PUBLIC_SERVER_URL")?)?;

        let api_path = lookup("PUBLIC_SERVER_API_PATH").unwrap_or_else(|| DEFAULT_API_PATH.into());
        if !api_path.starts_with('/') {
            return Err(ConfigError::invalid(
                "PUBLIC_SERVER_API_PATH",
                "API Path must start with \"/\" if provided.",
            ));
        }
        let api_path = api_path.trim_end_matches('/').to_string();
        if api_path.is_empty() {
            // Pages own the site root.
            return Err(ConfigError::invalid(
                "PUBLIC_SERVER_API_PATH",
                "API Path must not be the site root",
            ));
        }

        let port = match lookup("WWW_PORT") {
            Some(raw) => parse_port("WWW_PORT", &raw)?,
            None => DEFAULT_PORT,
        };

        let trusted_origins = lookup("TRUSTED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| parse_url("TRUSTED_ORIGINS", s))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            database_url,
            auth_secret,
            web_url,
            server_url,
            api_path,
            port,
            trusted_origins,
            session_https_only: lookup("SESSION_HTTPS_ONLY")
                .map(|v| v == "true" || v == "1" || v == "True")
                .unwrap_or(false),
            cookie_domain: lookup("COOKIE_DOMAIN").filter(|v| !v.is_empty()),
        })
    }

    /// Options for the auth instance. The web app's own URL is always trusted.
    pub fn auth_options(&self) -> AuthOptions {
        let mut trusted_origins = vec![self.web_url.clone()];
        for origin in &self.trusted_origins {
            if !trusted_origins.contains(origin) {
                trusted_origins.push(origin.clone());
            }
        }

        AuthOptions {
            server_url: self.server_url.clone(),
            api_path: self.api_path.clone(),
            secret: self.auth_secret.clone(),
            trusted_origins,
            plugins: vec![std::sync::Arc::new(OpenApiPlugin)],
            session_ttl: Duration::days(7),
            session_update_age: Duration::days(1),
            https_only: self.session_https_only,
            cookie_domain: self.cookie_domain.clone(),
        }
    }

    /// Base URL of the backend API, e.g. `http://localhost:3001/api`.
    pub fn api_base_url(&self) -> String {
        format!("{}{}", self.server_url, self.api_path.trim_end_matches('/'))
    }
}

/// Configuration for testing: in-memory store, all fields settable directly.
impl Config {
    pub fn test_default() -> Self {
        Self {
            database_url: "memory://".into(),
            auth_secret: "test-secret-key-that-is-long-enough-0123".into(),
            web_url: "http://localhost:3000".into(),
            server_url: "http://localhost:3001".into(),
            api_path: DEFAULT_API_PATH.into(),
            port: DEFAULT_PORT,
            trusted_origins: Vec::new(),
            session_https_only: false,
            cookie_domain: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(String),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// The environment variable that failed validation.
    pub fn key(&self) -> &str {
        match self {
            ConfigError::Missing(key) => key,
            ConfigError::Invalid { key, .. } => key,
        }
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(key.into())),
    }
}

/// Parse and normalize a URL, dropping any trailing slash.
fn parse_url(key: &str, raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::invalid(key, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::invalid(key, "must be an http(s) URL"));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

fn parse_port(key: &str, raw: &str) -> Result<u16, ConfigError> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::invalid(key, "must be an integer between 0 and 65535"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn valid_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DB_POSTGRES_URL", "postgres://localhost/tstack"),
            ("SERVER_AUTH_SECRET", "0123456789abcdef0123456789abcdef"),
            ("PUBLIC_WEB_URL", "http://localhost:3000"),
            ("PUBLIC_SERVER_URL", "http://localhost:3001/"),
        ]
    }

    fn without(key: &str) -> Vec<(&'static str, &'static str)> {
        valid_env().into_iter().filter(|(k, _)| *k != key).collect()
    }

    fn with(key: &'static str, value: &'static str) -> Vec<(&'static str, &'static str)> {
        let mut env = without(key);
        env.push((key, value));
        env
    }

    #[test]
    fn test_valid_env_with_defaults() {
        let cfg = Config::from_lookup(lookup_from(&valid_env())).unwrap();
        assert_eq!(cfg.port, 3001);
        assert_eq!(cfg.api_path, "/api");
        assert_eq!(cfg.server_url, "http://localhost:3001");
        assert_eq!(cfg.api_base_url(), "http://localhost:3001/api");
        assert!(cfg.trusted_origins.is_empty());
        assert!(!cfg.session_https_only);
    }

    #[test]
    fn test_missing_database_url_names_key() {
        let err = Config::from_lookup(lookup_from(&without("DB_POSTGRES_URL"))).unwrap_err();
        assert_eq!(err.key(), "DB_POSTGRES_URL");
        assert!(err.to_string().contains("DB_POSTGRES_URL"));
    }

    #[test]
    fn test_empty_database_url_rejected() {
        let err = Config::from_lookup(lookup_from(&with("DB_POSTGRES_URL", ""))).unwrap_err();
        assert_eq!(err.key(), "DB_POSTGRES_URL");
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = Config::from_lookup(lookup_from(&with("SERVER_AUTH_SECRET", "too-short")))
            .unwrap_err();
        assert_eq!(err.key(), "SERVER_AUTH_SECRET");
        assert!(err.to_string().contains("32"));
    }

    #[test]
    fn test_better_auth_secret_fallback() {
        let mut env = without("SERVER_AUTH_SECRET");
        env.push(("BETTER_AUTH_SECRET", "fedcba9876543210fedcba9876543210"));
        let cfg = Config::from_lookup(lookup_from(&env)).unwrap();
        assert_eq!(cfg.auth_secret, "fedcba9876543210fedcba9876543210");
    }

    #[test]
    fn test_missing_secret_names_primary_key() {
        let err = Config::from_lookup(lookup_from(&without("SERVER_AUTH_SECRET"))).unwrap_err();
        assert_eq!(err.key(), "SERVER_AUTH_SECRET");
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = Config::from_lookup(lookup_from(&with("PUBLIC_WEB_URL", "not a url"))).unwrap_err();
        assert_eq!(err.key(), "PUBLIC_WEB_URL");
    }

    #[test]
    fn test_api_path_must_start_with_slash() {
        let err = Config::from_lookup(lookup_from(&with("PUBLIC_SERVER_API_PATH", "api")))
            .unwrap_err();
        assert_eq!(err.key(), "PUBLIC_SERVER_API_PATH");

        let cfg = Config::from_lookup(lookup_from(&with("PUBLIC_SERVER_API_PATH", "/v1/")))
            .unwrap();
        assert_eq!(cfg.api_path, "/v1");

        let err = Config::from_lookup(lookup_from(&with("PUBLIC_SERVER_API_PATH", "/")))
            .unwrap_err();
        assert_eq!(err.key(), "PUBLIC_SERVER_API_PATH");
    }

    #[test]
    fn test_port_range() {
        let cfg = Config::from_lookup(lookup_from(&with("WWW_PORT", "8080"))).unwrap();
        assert_eq!(cfg.port, 8080);

        for bad in ["65536", "-1", "abc", "80.5"] {
            let mut env = without("WWW_PORT");
            env.push(("WWW_PORT", bad));
            let err = Config::from_lookup(lookup_from(&env)).unwrap_err();
            assert_eq!(err.key(), "WWW_PORT", "port {bad} should be rejected");
        }
    }

    #[test]
    fn test_trusted_origins_parsed_and_validated() {
        let cfg = Config::from_lookup(lookup_from(&with(
            "TRUSTED_ORIGINS",
            "http://localhost:5173, https://app.example.com/",
        )))
        .unwrap();
        assert_eq!(
            cfg.trusted_origins,
            vec!["http://localhost:5173", "https://app.example.com"]
        );

        let err = Config::from_lookup(lookup_from(&with("TRUSTED_ORIGINS", "nope"))).unwrap_err();
        assert_eq!(err.key(), "TRUSTED_ORIGINS");
    }

    #[test]
    fn test_auth_options_always_trust_web_url() {
        let mut cfg = Config::test_default();
        cfg.trusted_origins = vec!["http://localhost:3000".into(), "http://other:1".into()];
        let opts = cfg.auth_options();
        assert_eq!(
            opts.trusted_origins,
            vec!["http://localhost:3000", "http://other:1"]
        );
        assert_eq!(opts.api_path, "/api");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let cfg = Config::test_default();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains(&cfg.auth_secret));
        assert!(rendered.contains("<redacted>"));
    }
}
