//! Common routes: index, health, readiness, version.

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'static str>,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn ready(State(state): State<AppState>) -> Result<Json<ReadyBody>, (axum::http::StatusCode, Json<ReadyBody>)> {
    if let Err(e) = state.store.ping().await {
        tracing::warn!(error = %e, "readiness check failed");
        return Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyBody {
                status: "degraded",
                database: Some("unavailable"),
            }),
        ));
    }
    Ok(Json(ReadyBody {
        status: "ok",
        database: Some("ok"),
    }))
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// API index: every mounted endpoint, grouped by resource.
async fn index(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut endpoints = serde_json::Map::new();
    if let Some(account) = state.catalog.account_schema() {
        endpoints.insert(
            "auth".into(),
            serde_json::json!({
                "POST /auth/login": format!("log in with {} and password", account.unique_key.as_deref().unwrap_or("key")),
                "POST /auth/verify": "check that a remembered account is still active"
            }),
        );
    }
    for s in &state.catalog.schemas {
        let p = &s.path_segment;
        endpoints.insert(
            p.clone(),
            serde_json::json!({
                format!("GET /{p}"): format!("list {}s", s.label),
                format!("GET /{p}/:id"): format!("get one {}", s.label),
                format!("POST /{p}"): format!("create a {}", s.label),
                format!("PUT /{p}/:id"): format!("update a {}", s.label),
                format!("DELETE /{p}/:id"): format!("delete a {}", s.label),
            }),
        );
    }
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": endpoints
    }))
}

/// GET /, /health, /ready, /version, /info.
pub fn common_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/version", get(version))
        .route("/info", get(version))
        .with_state(state)
}
