//! HTTP API handlers and routing.

pub mod error;
mod health;
mod nodes;
mod proxy;
mod request_context;
mod sessions;

use axum::{
    http::{header, Method},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Create the main API router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static("apikey")])
        .allow_origin(Any);

    Router::new()
        .merge(health::routes())
        .merge(proxy::routes())
        .merge(nodes::routes())
        .merge(sessions::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
