//! CSRF protection middleware
//!
//! HTTP glue over [`crate::csrf`]: acquires the per-session secret, mints
//! a freshly masked token onto every response, and validates the client's
//! token on state-changing methods. The masking scheme and its threat
//! model are documented on the protocol module.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::SET_COOKIE, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::config::CsrfConfig;
use crate::csrf::{self, CSRF_TOKEN_HEADER};
use crate::session::{Session, SessionStore};
use crate::utils::errors::{GuardError, GuardResult};

const SAFE_METHODS: [Method; 3] = [Method::GET, Method::HEAD, Method::TRACE];

/// State shared by every guard invocation.
pub struct CsrfState {
    pub store: Arc<dyn SessionStore>,
    pub cookie_name: String,
    pub secret_length: usize,
}

impl CsrfState {
    pub fn new(store: Arc<dyn SessionStore>, config: &CsrfConfig) -> Self {
        Self {
            store,
            cookie_name: config.cookie_name.clone(),
            secret_length: config.secret_length,
        }
    }
}

/// Everything produced ahead of validation: the header for the outgoing
/// response, the secret to validate against, and the session cookie when
/// the secret was first persisted on this request.
struct MintedToken {
    header: HeaderValue,
    secret: Vec<u8>,
    session_id: String,
    set_cookie: Option<HeaderValue>,
}

impl MintedToken {
    fn apply(&self, response: &mut Response) {
        response
            .headers_mut()
            .insert(CSRF_TOKEN_HEADER, self.header.clone());

        if let Some(cookie) = &self.set_cookie {
            response.headers_mut().append(SET_COOKIE, cookie.clone());
        }
    }
}

pub async fn csrf_middleware(
    State(state): State<Arc<CsrfState>>,
    mut request: Request,
    next: Next,
) -> Response {
    // Failures while acquiring the secret or minting the mask are server
    // faults; the request ends here with a bare 500 and no token header.
    let minted = match mint(&state, &mut request).await {
        Ok(minted) => minted,
        Err(e) => return e.into_response(),
    };

    // Safe verbs skip validation but still leave with a fresh token.
    if !SAFE_METHODS.contains(request.method()) {
        // From here on failures come from clients behaving incorrectly,
        // badly, or maliciously, not from us.
        if let Err(e) = validate(&state, &request, &minted) {
            let mut response = e.into_response();
            minted.apply(&mut response);
            return response;
        }
    }

    let mut response = next.run(request).await;
    minted.apply(&mut response);
    response
}

async fn mint(state: &CsrfState, request: &mut Request) -> GuardResult<MintedToken> {
    // The session middleware threads the record through extensions; fall
    // back to asking the store directly when the guard runs on its own.
    let mut session = match request.extensions().get::<Session>() {
        Some(session) => session.clone(),
        None => state
            .store
            .get(request.headers(), &state.cookie_name)
            .await
            .map_err(|e| {
                error!(error = %e, "unable to get session");
                GuardError::from(e)
            })?,
    };

    let mut set_cookie = None;

    // do we have a secret for this session? if not, add one
    let stored = session
        .get::<Vec<u8>>(csrf::SECRET_SESSION_KEY)
        .filter(|secret| secret.len() == state.secret_length);

    let secret = match stored {
        Some(secret) => secret,
        None => {
            let secret = csrf::generate_secret(state.secret_length).map_err(|e| {
                error!(error = %e, "unable to generate csrf secret");
                e
            })?;

            session
                .insert(csrf::SECRET_SESSION_KEY, &secret)
                .map_err(|e| {
                    error!(error = %e, "unable to store csrf secret on session");
                    GuardError::from(e)
                })?;

            let cookie = state.store.save(&session).await.map_err(|e| {
                error!(error = %e, "unable to save session");
                GuardError::from(e)
            })?;

            set_cookie = Some(cookie);
            request.extensions_mut().insert(session.clone());
            secret
        }
    };

    let otp = csrf::generate_otp(state.secret_length).map_err(|e| {
        error!(error = %e, "unable to generate csrf otp");
        e
    })?;

    let encoded = csrf::mask(&secret, &otp).map_err(|e| {
        error!(error = %e, "failed to mask token");
        e
    })?;

    let header = HeaderValue::from_str(&encoded)
        .map_err(|e| GuardError::Internal(format!("token not header-safe: {e}")))?;

    Ok(MintedToken {
        header,
        secret,
        session_id: session.id().to_owned(),
        set_cookie,
    })
}

fn validate(state: &CsrfState, request: &Request, minted: &MintedToken) -> GuardResult<()> {
    // A missing header reads as the empty string and fails the length
    // check inside unmask, same as any other truncated token.
    let supplied = request
        .headers()
        .get(CSRF_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    let claimed = csrf::unmask(supplied, state.secret_length).map_err(|e| {
        error!(error = %e, "malformed csrf token");
        e
    })?;

    if !csrf::verify(&claimed, &minted.secret) {
        // possible attack or client desync; token bytes stay out of the log
        warn!(
            session = %minted.session_id,
            claimed_len = claimed.len(),
            "csrf token mismatch"
        );
        return Err(GuardError::TokenMismatch);
    }

    Ok(())
}
