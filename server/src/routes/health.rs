//! Health check endpoints.
//!
//! Answered before any protocol upgrade; none of these construct a
//! connection or touch the registry.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub connections: usize,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ping", get(ping))
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "beacon-signaling".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections: state.registry.connection_count(),
    })
}

/// Liveness probe handler.
async fn ping() -> &'static str {
    "pong"
}

/// Static banner for plain GETs against the root path.
pub async fn banner() -> &'static str {
    "Beacon Signaling Server"
}
