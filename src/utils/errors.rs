use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::session::SessionError;

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("session error: {0}")]
    Session(String),

    #[error("randomness error: {0}")]
    Randomness(String),

    #[error("malformed csrf token: {0}")]
    MalformedToken(String),

    #[error("csrf token mismatch")]
    TokenMismatch,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<SessionError> for GuardError {
    fn from(e: SessionError) -> Self {
        GuardError::Session(e.to_string())
    }
}

impl GuardError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MalformedToken(_) | Self::TokenMismatch => StatusCode::BAD_REQUEST,
            Self::Session(_) | Self::Randomness(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        // Clients only ever see the generic status text; detail goes to the
        // operator log at the failure site.
        let status = self.status_code();
        let body = status.canonical_reason().unwrap_or("").to_owned();

        (status, body).into_response()
    }
}

pub type GuardResult<T> = Result<T, GuardError>;
