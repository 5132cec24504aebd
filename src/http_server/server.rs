use crate::config::Config;
use crate::http_server::middleware::{
    csrf_middleware, session_middleware, CsrfState, SessionLayerState,
};
use crate::http_server::routes;
use crate::session::SessionStore;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct HttpServer {
    config: Config,
    store: Arc<dyn SessionStore>,
}

impl HttpServer {
    pub fn new(config: Config, store: Arc<dyn SessionStore>) -> Self {
        Self { config, store }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from((
            self.config.server.host.parse::<std::net::IpAddr>()?,
            self.config.server.port,
        ));
        let app = self.router();

        info!("Starting HTTP server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Demo routes wrapped in the full chain: request-id tagging and trace
    /// logging on the outside, then session establishment, then the guard.
    pub fn router(&self) -> Router {
        let session_state = Arc::new(SessionLayerState::new(
            self.store.clone(),
            self.config.csrf.cookie_name.clone(),
        ));
        let csrf_state = Arc::new(CsrfState::new(self.store.clone(), &self.config.csrf));

        Router::new()
            .route("/health", get(routes::health))
            .route("/echo", post(routes::echo))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TraceLayer::new_for_http())
                    .layer(middleware::from_fn_with_state(
                        session_state,
                        session_middleware,
                    ))
                    .layer(middleware::from_fn_with_state(csrf_state, csrf_middleware)),
            )
    }
}
