//! In-memory session backend
//!
//! Records live server side; the cookie only carries an opaque random id,
//! so nothing stored in the session can leak or be tampered with through
//! the cookie itself. Expiry is idle-based and enforced lazily: a record
//! whose last touch is older than the TTL is dropped the next time its id
//! shows up.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{cookie_value, Session, SessionError, SessionResult, SessionStore};

struct StoredSession {
    values: HashMap<String, Value>,
    touched_at: DateTime<Utc>,
}

pub struct MemoryStore {
    sessions: DashMap<String, StoredSession>,
    ttl: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: None,
        }
    }

    /// Store that drops records idle for longer than `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Some(ttl),
        }
    }

    /// Number of live records. Expired records linger until their id is
    /// next presented.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn expired(&self, touched_at: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => Utc::now() - touched_at > ttl,
            None => false,
        }
    }

    fn cookie_for(&self, session: &Session) -> SessionResult<HeaderValue> {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            session.cookie_name(),
            session.id()
        );

        if let Some(ttl) = self.ttl {
            cookie.push_str(&format!("; Max-Age={}", ttl.num_seconds()));
        }

        HeaderValue::from_str(&cookie).map_err(|e| SessionError::Save(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, headers: &HeaderMap, cookie_name: &str) -> SessionResult<Session> {
        if let Some(id) = cookie_value(headers, cookie_name) {
            let mut expired = false;

            if let Some(mut entry) = self.sessions.get_mut(&id) {
                if self.expired(entry.touched_at) {
                    expired = true;
                } else {
                    entry.touched_at = Utc::now();
                    return Ok(Session::existing(
                        id,
                        cookie_name.to_owned(),
                        entry.values.clone(),
                    ));
                }
            }

            if expired {
                self.sessions.remove(&id);
                debug!(session = %id, "session expired, issuing a new one");
            } else {
                debug!(session = %id, "unknown session id, issuing a new one");
            }
        }

        let id = Uuid::new_v4().simple().to_string();
        Ok(Session::fresh(id, cookie_name.to_owned()))
    }

    async fn save(&self, session: &Session) -> SessionResult<HeaderValue> {
        self.sessions.insert(
            session.id().to_owned(),
            StoredSession {
                values: session.values().clone(),
                touched_at: Utc::now(),
            },
        );

        self.cookie_for(session)
    }
}
