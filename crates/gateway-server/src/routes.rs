//! Route definitions for the gateway API.

use axum::{
    http::{header, HeaderName, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{bridge, handlers, state::AppState};

/// Create the main API router
///
/// The root path carries both transports: POST relays a generation request,
/// GET upgrades to the realtime WebSocket bridge.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Relay and realtime bridge
        .route("/", post(handlers::relay).get(bridge::realtime_upgrade))
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check))
        // Apply middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        // Add state
        .with_state(state)
}

/// Permissive CORS for browser clients
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
}
