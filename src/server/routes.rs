use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        // Event intake
        .route("/v1/events", post(handlers::events::emit_event))
        // Subscriptions
        .route(
            "/v1/subscriptions",
            post(handlers::subscriptions::create_subscription),
        )
        .route(
            "/v1/subscriptions",
            get(handlers::subscriptions::list_subscriptions),
        )
        .route(
            "/v1/subscriptions/:id",
            get(handlers::subscriptions::get_subscription),
        )
        .route(
            "/v1/subscriptions/:id",
            patch(handlers::subscriptions::update_subscription),
        )
        .route(
            "/v1/subscriptions/:id",
            delete(handlers::subscriptions::delete_subscription),
        )
        .route(
            "/v1/subscriptions/:id/secret",
            post(handlers::subscriptions::regenerate_secret),
        )
        .route(
            "/v1/subscriptions/:id/test",
            post(handlers::subscriptions::test_subscription),
        )
        .route(
            "/v1/subscriptions/:id/deliveries/recent",
            get(handlers::deliveries::recent_deliveries),
        )
        // Deliveries
        .route("/v1/deliveries", get(handlers::deliveries::list_deliveries))
        .route(
            "/v1/deliveries/stats",
            get(handlers::deliveries::delivery_stats),
        )
        .route("/v1/deliveries/:id", get(handlers::deliveries::get_delivery))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
