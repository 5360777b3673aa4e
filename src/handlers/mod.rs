// HTTP surface: the redirect hot path, the realtime WebSocket, and the
// ambient health/metrics endpoints.

pub mod health;
pub mod pages;
pub mod realtime_ws;
pub mod redirect;

use crate::app::AppState;
use axum::routing::get;
use axum::Router;

pub fn redirect_routes() -> Router<AppState> {
    Router::new().route("/{short_code}", get(redirect::redirect))
}

pub fn realtime_routes() -> Router<AppState> {
    Router::new().route("/ws/analytics/realtime", get(realtime_ws::realtime_upgrade))
}

pub fn ambient_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/health", get(health::health_check))
        .route("/v1/metrics", get(health::metrics))
}
