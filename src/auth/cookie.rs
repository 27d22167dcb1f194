//! HMAC-SHA256 session cookie signing, parsing and `Set-Cookie` rendering.
//!
//! Cookie value: `base64url(token).base64url(hmac(secret, token))`. The HMAC
//! covers only the token; the session itself lives in the store.

use axum::http::{HeaderMap, header};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const COOKIE_NAME: &str = "tstack.session_token";

/// Attributes shared by the set and clear variants of the session cookie.
#[derive(Debug, Clone, Default)]
pub struct CookieOptions {
    pub https_only: bool,
    pub domain: Option<String>,
    pub max_age_secs: i64,
}

fn mac(secret: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length.
    HmacSha256::new_from_slice(secret).expect("HMAC key length is always valid")
}

/// Sign a session token, returning the cookie value.
pub fn sign_token(secret: &[u8], token: &str) -> String {
    let mut mac = mac(secret);
    mac.update(token.as_bytes());
    let signature = mac.finalize().into_bytes();

    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(token.as_bytes()),
        URL_SAFE_NO_PAD.encode(signature)
    )
}

/// Verify a signed cookie value and extract the token.
///
/// Returns `None` if the signature is invalid, the format is wrong or the
/// token is empty.
pub fn verify_token(secret: &[u8], cookie_value: &str) -> Option<String> {
    let (token_part, sig_part) = cookie_value.split_once('.')?;

    let token = String::from_utf8(URL_SAFE_NO_PAD.decode(token_part).ok()?).ok()?;
    if token.is_empty() {
        return None;
    }
    let signature = URL_SAFE_NO_PAD.decode(sig_part).ok()?;

    let mut mac = mac(secret);
    mac.update(token.as_bytes());
    mac.verify_slice(&signature).ok()?;

    Some(token)
}

/// Read the raw (still signed) session cookie from request headers.
///
/// Absent and empty `Cookie` headers are treated the same.
pub fn read_session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|h| parse_cookie(h, COOKIE_NAME))
        .filter(|v| !v.is_empty())
}

/// Parse a specific cookie from a Cookie header value.
pub fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|part| {
        part.trim()
            .strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
    })
}

/// `Set-Cookie` value establishing the session.
pub fn set_cookie(options: &CookieOptions, signed_value: &str) -> String {
    render(
        options,
        &format!("{COOKIE_NAME}={signed_value}"),
        options.max_age_secs,
    )
}

/// `Set-Cookie` value clearing the session.
pub fn clear_cookie(options: &CookieOptions) -> String {
    render(options, &format!("{COOKIE_NAME}="), 0)
}

fn render(options: &CookieOptions, pair: &str, max_age: i64) -> String {
    let mut parts = vec![
        pair.to_string(),
        format!("Max-Age={max_age}"),
        "Path=/".into(),
        "HttpOnly".into(),
        "SameSite=Lax".into(),
    ];
    if options.https_only {
        parts.push("Secure".into());
    }
    if let Some(domain) = &options.domain {
        parts.push(format!("Domain={domain}"));
    }
    parts.join("; ")
}
