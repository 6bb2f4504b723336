//! Login and session verification handlers for the account schema.

use super::resource::body_to_map;
use crate::error::AppError;
use crate::response::{AccountBody, LoginBody};
use crate::schema::ResourceSchema;
use crate::service::AuthService;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use serde_json::{Map, Value};

fn account_schema(state: &AppState) -> Result<&ResourceSchema, AppError> {
    state
        .catalog
        .account_schema()
        .ok_or_else(|| AppError::NotFound("no account resource configured".into()))
}

/// String value of `key`, or "" when absent or not a string.
fn text<'a>(body: &'a Map<String, Value>, key: Option<&str>) -> &'a str {
    key.and_then(|k| body.get(k))
        .and_then(Value::as_str)
        .unwrap_or_default()
}

/// POST /auth/login — `{<unique key>, <credential>}`, e.g. `{"email", "password"}`.
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let schema = account_schema(&state)?;
    let body = body_to_map(body)?;
    let lookup = text(&body, schema.unique_key.as_deref());
    let password = text(&body, schema.credential_field().map(|f| f.name.as_str()));
    let account = AuthService::login(
        state.store.as_ref(),
        schema,
        lookup,
        password,
        state.legacy_plaintext_login,
    )
    .await?;
    Ok(Json(LoginBody {
        message: "login successful".into(),
        account,
    }))
}

/// POST /auth/verify — `{<unique key>}`; confirms the account still exists and is active.
pub async fn verify(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let schema = account_schema(&state)?;
    let body = body_to_map(body)?;
    let lookup = text(&body, schema.unique_key.as_deref());
    let account = AuthService::verify(state.store.as_ref(), schema, lookup).await?;
    Ok(Json(AccountBody { account }))
}
