//! Route definitions for the API.

use axum::{middleware, routing::get, Router};

use super::handlers;
use super::middleware::auth::identity_middleware;
use super::SharedState;

/// Create the main API router
pub fn create_router(state: SharedState) -> Router {
    let api = Router::new()
        .merge(handlers::artifacts::router())
        .merge(handlers::votes::router())
        .merge(handlers::flags::router())
        .merge(handlers::comments::router())
        .merge(handlers::expert::router())
        .merge(handlers::publication::router())
        .merge(handlers::admin::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ));

    Router::new()
        // Health endpoints (no identity required)
        .route("/health", get(handlers::health::health_check))
        .route("/healthz", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .nest("/api/v1", api)
        .with_state(state)
}
