// Module: http
// REST control surface for broadcast sessions and media credentials

pub mod auth;
pub mod broadcast;
pub mod error;
pub mod health;
pub mod media_token;
pub mod middleware;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use gridcast_compositor::BroadcastController;
use gridcast_core::service::{AuthService, SessionRegistry};
use gridcast_media::MediaTransport;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::observability::metrics;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub registry: Arc<SessionRegistry>,
    pub controller: Arc<BroadcastController>,
    pub transport: Arc<dyn MediaTransport>,
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        // Health check endpoints (for monitoring probes)
        .merge(health::create_health_router())
        .route("/metrics", get(metrics::metrics_handler))
        // Authentication routes
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        // Media credential route
        .route("/api/media/token", post(media_token::issue_token))
        // Broadcast session routes
        .route(
            "/api/broadcasts",
            post(broadcast::create_broadcast).get(broadcast::list_broadcasts),
        )
        .route("/api/broadcasts/active", get(broadcast::get_active))
        .route(
            "/api/broadcasts/active/stats",
            get(broadcast::active_stats),
        )
        .route(
            "/api/broadcasts/{id}",
            put(broadcast::update_broadcast).get(broadcast::get_broadcast),
        )
        .route("/api/broadcasts/{id}/stop", post(broadcast::stop_broadcast));

    // Apply layers before state
    let router = router
        .layer(axum::middleware::from_fn(metrics::metrics_layer))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Apply state to all routes (must be last)
    router.with_state(state)
}
