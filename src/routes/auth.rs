use crate::handlers::auth::{login, verify};
use crate::state::AppState;
use axum::{routing::post, Router};

pub fn auth_routes(state: AppState) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/verify", post(verify))
        .with_state(state)
}
