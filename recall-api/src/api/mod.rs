use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::core::state::AppState;
use crate::middleware::{error_handler, request_id};

pub mod invoke;
pub mod memories;


pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/invoke", post(invoke::invoke))
        .route("/memories/search", post(memories::search_memories))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(error_handler::handle_errors))
                .layer(middleware::from_fn(request_id::add_request_id)),
        )
}

async fn health_check() -> &'static str {
    "OK"
}
