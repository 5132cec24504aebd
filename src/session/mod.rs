//! Session store collaborator
//!
//! The guard needs exactly three things from a session backend: resolve a
//! record for the inbound cookie (creating one when absent), read/write
//! values on it, and persist mutations while handing back the cookie to
//! set on the response. [`SessionStore`] is that narrow surface; the rest
//! of the crate never sees how records are kept.

mod memory;

pub use memory::MemoryStore;

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("store backend unavailable: {0}")]
    Backend(String),

    #[error("failed to persist session: {0}")]
    Save(String),

    #[error("session value serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// A single client's session record.
///
/// Values are stored as JSON so callers can keep arbitrary serde types in
/// the session without the store caring what they are.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    cookie_name: String,
    values: HashMap<String, Value>,
    is_new: bool,
}

impl Session {
    pub(crate) fn fresh(id: String, cookie_name: String) -> Self {
        Self {
            id,
            cookie_name,
            values: HashMap::new(),
            is_new: true,
        }
    }

    pub(crate) fn existing(
        id: String,
        cookie_name: String,
        values: HashMap<String, Value>,
    ) -> Self {
        Self {
            id,
            cookie_name,
            values,
            is_new: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the cookie this session travels under.
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Whether this record was created for the current request rather than
    /// loaded from the backend.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Read a value, returning `None` when the key is absent or holds a
    /// different type than asked for.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn insert<T: Serialize>(&mut self, key: &str, value: T) -> SessionResult<()> {
        self.values
            .insert(key.to_owned(), serde_json::to_value(value)?);

        Ok(())
    }

    pub(crate) fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }
}

/// Backend capable of resolving and persisting session records.
///
/// `get` returns the existing record for the request's cookie or a freshly
/// initialized one; it never yields an empty session without an error.
/// `save` persists the record and returns the `Set-Cookie` value the
/// caller applies to the response. Implementations are responsible for
/// their own concurrency safety; callers perform no locking.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, headers: &HeaderMap, cookie_name: &str) -> SessionResult<Session>;

    async fn save(&self, session: &Session) -> SessionResult<HeaderValue>;
}

/// Pull a single cookie's value out of the request headers.
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for header_value in headers.get_all(header::COOKIE) {
        let Ok(raw) = header_value.to_str() else {
            continue;
        };

        for pair in raw.split(';') {
            if let Some((key, value)) = pair.trim().split_once('=') {
                if key == name {
                    return Some(value.to_owned());
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_value_found() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "theme=dark; SESSION=abc123".parse().unwrap());

        assert_eq!(cookie_value(&headers, "SESSION"), Some("abc123".to_owned()));
        assert_eq!(cookie_value(&headers, "theme"), Some("dark".to_owned()));
    }

    #[test]
    fn test_cookie_value_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "theme=dark".parse().unwrap());

        assert_eq!(cookie_value(&headers, "SESSION"), None);
        assert_eq!(cookie_value(&HeaderMap::new(), "SESSION"), None);
    }

    #[test]
    fn test_cookie_value_across_multiple_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, "theme=dark".parse().unwrap());
        headers.append(header::COOKIE, "SESSION=xyz".parse().unwrap());

        assert_eq!(cookie_value(&headers, "SESSION"), Some("xyz".to_owned()));
    }

    #[test]
    fn test_session_value_round_trip() {
        let mut session = Session::fresh("id-1".into(), "SESSION".into());
        session.insert("count", 7u32).unwrap();

        assert_eq!(session.get::<u32>("count"), Some(7));
        assert_eq!(session.get::<u32>("missing"), None);
    }

    #[test]
    fn test_session_value_wrong_type_reads_as_none() {
        let mut session = Session::fresh("id-1".into(), "SESSION".into());
        session.insert("flag", "not a number").unwrap();

        assert_eq!(session.get::<Vec<u8>>("flag"), None);
    }

    #[test]
    fn test_fresh_and_existing_flags() {
        let fresh = Session::fresh("a".into(), "SESSION".into());
        assert!(fresh.is_new());

        let existing = Session::existing("a".into(), "SESSION".into(), HashMap::new());
        assert!(!existing.is_new());
    }
}
