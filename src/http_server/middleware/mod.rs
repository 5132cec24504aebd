//! HTTP server middleware

pub mod csrf;
pub mod session;

pub use csrf::{csrf_middleware, CsrfState};
pub use session::{session_middleware, SessionLayerState};
