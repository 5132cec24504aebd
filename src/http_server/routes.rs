use axum::response::Json;

/// Health check endpoint
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Echoes the request body back. State-changing by convention, so requests
/// only land here once the guard has accepted their token.
pub async fn echo(body: String) -> String {
    body
}
