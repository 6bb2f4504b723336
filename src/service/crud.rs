//! Generic CRUD over any resource schema: validation, credential hashing, response shaping.

use super::validation::{RequestValidator, WriteMode};
use crate::credentials;
use crate::error::AppError;
use crate::schema::ResourceSchema;
use crate::store::{Record, ResourceStore};
use serde_json::{Map, Value};

pub struct ResourceService;

impl ResourceService {
    /// All rows in the schema's default ordering, credentials removed.
    pub async fn list(store: &dyn ResourceStore, schema: &ResourceSchema) -> Result<Vec<Record>, AppError> {
        let rows = store.list(schema).await?;
        Ok(rows.into_iter().map(|r| strip_sensitive(schema, r)).collect())
    }

    pub async fn get(store: &dyn ResourceStore, schema: &ResourceSchema, id: i64) -> Result<Record, AppError> {
        store
            .get(schema, id)
            .await?
            .map(|r| strip_sensitive(schema, r))
            .ok_or_else(|| not_found(schema, id))
    }

    /// Validate, hash the credential, insert under the smallest free id. Returns the id.
    pub async fn create(
        store: &dyn ResourceStore,
        schema: &ResourceSchema,
        body: &Map<String, Value>,
    ) -> Result<i64, AppError> {
        let mut record = RequestValidator::validate(body, schema, WriteMode::Create)?;
        hash_credential(schema, &mut record).await?;
        let plan = store.create(schema, &record).await?;
        tracing::info!(resource = %schema.label, id = plan.id, counter = plan.counter, "created");
        Ok(plan.id)
    }

    /// Replace the row's fields. An omitted or empty credential keeps the stored one.
    pub async fn update(
        store: &dyn ResourceStore,
        schema: &ResourceSchema,
        id: i64,
        body: &Map<String, Value>,
    ) -> Result<(), AppError> {
        let mut record = RequestValidator::validate(body, schema, WriteMode::Update)?;
        hash_credential(schema, &mut record).await?;
        if !store.update(schema, id, &record).await? {
            return Err(not_found(schema, id));
        }
        tracing::info!(resource = %schema.label, id, "updated");
        Ok(())
    }

    pub async fn delete(store: &dyn ResourceStore, schema: &ResourceSchema, id: i64) -> Result<(), AppError> {
        if !store.delete(schema, id).await? {
            return Err(not_found(schema, id));
        }
        tracing::info!(resource = %schema.label, id, "deleted");
        Ok(())
    }
}

fn not_found(schema: &ResourceSchema, id: impl std::fmt::Display) -> AppError {
    AppError::NotFound(format!("{} {}", schema.label, id))
}

/// Parse a path id. Anything that is not a positive integer cannot name a row.
pub fn parse_id(schema: &ResourceSchema, raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| not_found(schema, raw))
}

/// Remove credential columns before a row leaves the service.
pub fn strip_sensitive(schema: &ResourceSchema, mut record: Record) -> Record {
    if let Some(f) = schema.credential_field() {
        record.remove(&f.name);
    }
    record
}

/// Replace a plain-text credential in `record` with its hash, off the async workers.
async fn hash_credential(schema: &ResourceSchema, record: &mut Record) -> Result<(), AppError> {
    let Some(field) = schema.credential_field() else {
        return Ok(());
    };
    let Some(plain) = record.get(&field.name).and_then(Value::as_str).map(String::from) else {
        return Ok(());
    };
    let hash = tokio::task::spawn_blocking(move || credentials::hash_password(&plain))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    record.insert(field.name.clone(), Value::String(hash));
    Ok(())
}
