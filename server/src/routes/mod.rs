//! HTTP route definitions.

pub mod health;

use crate::handlers::websocket::{root_handler, ws_handler};
use crate::AppState;
use axum::{routing::get, Router};

/// Create all application routes.
///
/// The root path serves both surfaces: upgrade requests become relay
/// sessions, plain requests get the health banner. Everything else is the
/// router's default 404.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .route("/", get(root_handler))
        .route("/ws", get(ws_handler))
}
