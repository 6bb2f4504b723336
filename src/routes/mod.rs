//! Router assembly.

mod auth;
mod common;
mod resource;

pub use auth::auth_routes;
pub use common::common_routes;
pub use resource::resource_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Request bodies are small field maps.
const BODY_LIMIT: usize = 64 * 1024;

/// Full application: common, auth and resource routes with tracing, body limit and CORS.
pub fn app(state: AppState, cors_permissive: bool) -> Router {
    let router = Router::new()
        .merge(common_routes(state.clone()))
        .merge(auth_routes(state.clone()))
        .merge(resource_routes(state))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(TraceLayer::new_for_http());
    if cors_permissive {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
