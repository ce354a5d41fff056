//! In-memory session store and session cookie helpers.
//!
//! The raw token is only handed to the client. The store is keyed by its
//! SHA-256 hash, so a dump of the store cannot be replayed as cookies.

use anyhow::{Context, Result};
use axum::http::{
    HeaderMap, HeaderValue,
    header::{AUTHORIZATION, COOKIE, InvalidHeaderValue},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, Utc};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, error};

use super::ApiConfig;
use crate::risk::Identity;

pub const SESSION_COOKIE_NAME: &str = "riskgate_session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub identity: Identity,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<Vec<u8>, SessionRecord>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_seconds.max(1)),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Create a session and return the raw token for the client.
    ///
    /// # Errors
    /// Returns an error if the OS random source fails or the store is poisoned.
    pub fn create(&self, identity: &Identity) -> Result<String> {
        let token = generate_session_token()?;
        let now = Utc::now();
        let record = SessionRecord {
            identity: identity.clone(),
            created_at: now,
            expires_at: now + self.ttl,
        };

        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| anyhow::anyhow!("session store lock poisoned"))?;
        sessions.retain(|_, session| session.expires_at > now);
        sessions.insert(hash_session_token(&token), record);

        debug!(identity = %identity, "session created");
        Ok(token)
    }

    /// Resolve a raw token to its live session.
    #[must_use]
    pub fn lookup(&self, token: &str) -> Option<SessionRecord> {
        let sessions = match self.sessions.lock() {
            Ok(sessions) => sessions,
            Err(_) => {
                error!("session store lock poisoned");
                return None;
            }
        };
        sessions
            .get(&hash_session_token(token))
            .filter(|session| session.expires_at > Utc::now())
            .cloned()
    }

    pub fn revoke(&self, token: &str) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.remove(&hash_session_token(token));
        }
    }
}

/// 32 random bytes, base64url without padding.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    Sha256::digest(token.as_bytes()).to_vec()
}

/// Build an `HttpOnly` cookie carrying the session token.
pub(crate) fn session_cookie(
    config: &ApiConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={ttl_seconds}"
    );
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_session_cookie(config: &ApiConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Bearer token first, then the session cookie.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let value = headers.get(COOKIE)?.to_str().ok()?;
    value.split(';').find_map(|pair| {
        let mut parts = pair.trim().splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        (key == SESSION_COOKIE_NAME && !val.is_empty()).then(|| val.to_string())
    })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_lookup_revoke() {
        let store = SessionStore::new(60);
        let alice = Identity::new("alice@example.com");

        let token = store.create(&alice).unwrap_or_default();
        assert!(!token.is_empty());
        assert_eq!(store.lookup(&token).map(|s| s.identity), Some(alice));

        store.revoke(&token);
        assert!(store.lookup(&token).is_none());
        assert!(store.lookup("not-a-token").is_none());
    }

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let a = generate_session_token().unwrap_or_default();
        let b = generate_session_token().unwrap_or_default();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn hash_is_sha256() {
        assert_eq!(hash_session_token("token").len(), 32);
        assert_ne!(hash_session_token("a"), hash_session_token("b"));
    }

    #[test]
    fn cookie_is_secure_only_over_https() {
        let https = ApiConfig::new("https://riskgate.dev".to_string());
        let cookie = session_cookie(&https, "abc").ok();
        let cookie = cookie.as_ref().and_then(|c| c.to_str().ok()).unwrap_or("");
        assert!(cookie.starts_with("riskgate_session=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.ends_with("; Secure"));

        let http = ApiConfig::new("http://localhost:5173".to_string());
        let cookie = clear_session_cookie(&http).ok();
        let cookie = cookie.as_ref().and_then(|c| c.to_str().ok()).unwrap_or("");
        assert!(cookie.contains("Max-Age=0"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn token_extraction_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; riskgate_session=from-cookie"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("from-cookie"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("from-header"));

        let mut empty = HeaderMap::new();
        empty.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(extract_session_token(&empty).is_none());
    }
}
