//! Resource CRUD handlers: list, read, create, update, delete. The schema is resolved from the path.

use crate::error::AppError;
use crate::response;
use crate::schema::ResourceSchema;
use crate::service::{parse_id, ResourceService};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::{Map, Value};

fn schema_for<'a>(state: &'a AppState, path_segment: &str) -> Result<&'a ResourceSchema, AppError> {
    state
        .catalog
        .schema_by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(format!("resource '{}'", path_segment)))
}

pub(crate) fn body_to_map(body: Result<Json<Value>, JsonRejection>) -> Result<Map<String, Value>, AppError> {
    let Json(value) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let schema = schema_for(&state, &path_segment)?;
    let rows = ResourceService::list(state.store.as_ref(), schema).await?;
    Ok(Json(rows))
}

pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let schema = schema_for(&state, &path_segment)?;
    let id = parse_id(schema, &id_str)?;
    let row = ResourceService::get(state.store.as_ref(), schema, id).await?;
    Ok(Json(row))
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let schema = schema_for(&state, &path_segment)?;
    let body = body_to_map(body)?;
    let id = ResourceService::create(state.store.as_ref(), schema, &body).await?;
    Ok(response::created(format!("{} created", schema.title()), id))
}

pub async fn update(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let schema = schema_for(&state, &path_segment)?;
    let body = body_to_map(body)?;
    let id = parse_id(schema, &id_str)?;
    ResourceService::update(state.store.as_ref(), schema, id, &body).await?;
    Ok(response::message(format!("{} updated", schema.title())))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let schema = schema_for(&state, &path_segment)?;
    let id = parse_id(schema, &id_str)?;
    ResourceService::delete(state.store.as_ref(), schema, id).await?;
    Ok(response::message(format!("{} deleted", schema.title())))
}
