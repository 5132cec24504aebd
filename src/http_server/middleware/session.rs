//! Session establishment middleware
//!
//! Runs ahead of the CSRF guard: resolves the session for the request's
//! cookie, persists brand-new sessions so the client gets its cookie on
//! first contact, and threads the record through to downstream middleware
//! via request extensions.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::session::SessionStore;
use crate::utils::errors::GuardError;

/// State for the session middleware.
pub struct SessionLayerState {
    pub store: Arc<dyn SessionStore>,
    pub cookie_name: String,
}

impl SessionLayerState {
    pub fn new(store: Arc<dyn SessionStore>, cookie_name: impl Into<String>) -> Self {
        Self {
            store,
            cookie_name: cookie_name.into(),
        }
    }
}

pub async fn session_middleware(
    State(state): State<Arc<SessionLayerState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = match state.store.get(request.headers(), &state.cookie_name).await {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "unable to get session");
            return GuardError::from(e).into_response();
        }
    };

    let mut set_cookie = None;
    if session.is_new() {
        match state.store.save(&session).await {
            Ok(cookie) => set_cookie = Some(cookie),
            Err(e) => {
                error!(error = %e, "unable to save session");
                return GuardError::from(e).into_response();
            }
        }
    }

    request.extensions_mut().insert(session);

    let mut response = next.run(request).await;

    if let Some(cookie) = set_cookie {
        response.headers_mut().append(SET_COOKIE, cookie);
    }

    response
}
