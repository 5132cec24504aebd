//! csrfguard: session-bound CSRF protection for axum services

pub mod config;
pub mod csrf;
pub mod http_server;
pub mod session;
pub mod utils;

pub use config::Config;
