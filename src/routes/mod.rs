use axum::{
    http::{Method, StatusCode},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    middleware::{make_span_with_request_id, request_id_middleware},
    services::{LibraryPipeline, RecommenderProvider},
};

pub mod library;
pub mod recommendations;

/// Shared, read-only handler state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<LibraryPipeline>,
    pub provider: Arc<dyn RecommenderProvider>,
    /// Prompt budget used when the request does not set one
    pub default_budget: usize,
    pub provider_timeout: Duration,
}

/// Creates the application router with all routes and request-id tracing
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(cors),
        )
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:user_id/library", get(library::get_library))
        .route(
            "/users/:user_id/recommendations",
            post(recommendations::recommend),
        )
        .route(
            "/users/:user_id/recommendations/surprise-me",
            post(recommendations::surprise_me),
        )
}

async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
