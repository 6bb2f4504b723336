//! Storage handle for resource rows. Constructed once at start-up and injected
//! into `AppState`, so handlers never reach for a global connection.

mod ddl;
mod memory;
mod postgres;
mod sql;

pub use ddl::{ensure_database_exists, ensure_tables};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::allocator::Allocation;
use crate::error::AppError;
use crate::schema::ResourceSchema;
use async_trait::async_trait;

/// One row as a JSON object: `id`, the schema's fields, `created_at`, `updated_at`.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Attempts at allocating an id before a concurrent creator's conflict is reported.
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 3;

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// All rows in the schema's default ordering. Rows include the credential column.
    async fn list(&self, schema: &ResourceSchema) -> Result<Vec<Record>, AppError>;

    async fn get(&self, schema: &ResourceSchema, id: i64) -> Result<Option<Record>, AppError>;

    /// Row whose unique key equals `key`, both compared under the key field's normalisation.
    async fn find_by_unique(&self, schema: &ResourceSchema, key: &str) -> Result<Option<Record>, AppError>;

    /// Insert under the smallest free id, then advance the table counter past the
    /// high-water mark. A failed counter advance is logged and does not fail the insert.
    async fn create(&self, schema: &ResourceSchema, record: &Record) -> Result<Allocation, AppError>;

    /// Replace the columns present in `record`. Returns false when no row has `id`.
    async fn update(&self, schema: &ResourceSchema, id: i64, record: &Record) -> Result<bool, AppError>;

    /// Returns false when no row has `id`.
    async fn delete(&self, schema: &ResourceSchema, id: i64) -> Result<bool, AppError>;

    async fn count(&self, schema: &ResourceSchema) -> Result<u64, AppError>;

    async fn ping(&self) -> Result<(), AppError>;
}

pub(crate) fn conflict_message(schema: &ResourceSchema) -> String {
    match &schema.unique_key {
        Some(key) => format!("a {} with that {} already exists", schema.label, key),
        None => format!("{} already exists", schema.label),
    }
}
