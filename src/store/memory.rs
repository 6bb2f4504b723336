//! In-memory store with the same allocation and uniqueness semantics as PostgreSQL.
//! Backs the integration tests and `STORE=memory` dev runs.

use super::{conflict_message, Record, ResourceStore};
use crate::allocator::Allocation;
use crate::error::AppError;
use crate::schema::{ListOrder, ResourceSchema};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Clone, Debug)]
struct StoredRow {
    values: Record,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Insertion sequence; breaks created_at ties.
    seq: u64,
}

impl StoredRow {
    fn to_record(&self, id: i64) -> Record {
        let mut out = Record::new();
        out.insert("id".into(), Value::from(id));
        out.extend(self.values.clone());
        out.insert("created_at".into(), timestamp(&self.created_at));
        out.insert("updated_at".into(), timestamp(&self.updated_at));
        out
    }
}

fn timestamp(t: &DateTime<Utc>) -> Value {
    Value::String(t.to_rfc3339_opts(SecondsFormat::Micros, true))
}

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<i64, StoredRow>,
    /// Auto-increment counter: the next id the engine itself would hand out.
    counter: i64,
    seq: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
    fail_counter_advance: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent counter advance fail, as a broken ALTER/setval would.
    pub fn set_counter_advance_failure(&self, fail: bool) {
        self.fail_counter_advance.store(fail, Ordering::SeqCst);
    }

    /// Current auto-increment counter of `table` (1 for an unknown table).
    pub async fn counter(&self, table: &str) -> i64 {
        self.tables
            .read()
            .await
            .get(table)
            .map(|t| t.counter.max(1))
            .unwrap_or(1)
    }

    /// Insert a row as-is under `id`, bypassing allocation, validation and hashing.
    /// Stands in for rows that pre-date the API, e.g. plain-text legacy passwords.
    pub async fn seed(&self, schema: &ResourceSchema, id: i64, values: Record) {
        let mut tables = self.tables.write().await;
        let table = tables.entry(schema.table_name.clone()).or_default();
        let now = Utc::now();
        table.seq += 1;
        let seq = table.seq;
        table.rows.insert(
            id,
            StoredRow {
                values,
                created_at: now,
                updated_at: now,
                seq,
            },
        );
        table.counter = table.counter.max(id + 1);
    }

    fn unique_taken(table: &Table, schema: &ResourceSchema, record: &Record, except: Option<i64>) -> bool {
        let Some(key) = &schema.unique_key else {
            return false;
        };
        let norm = schema.unique_normalize();
        let Some(wanted) = record.get(key).and_then(Value::as_str).map(|v| norm.apply(v)) else {
            return false;
        };
        table.rows.iter().any(|(id, row)| {
            Some(*id) != except
                && row
                    .values
                    .get(key)
                    .and_then(Value::as_str)
                    .map(|v| norm.apply(v))
                    .as_deref()
                    == Some(wanted.as_str())
        })
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn list(&self, schema: &ResourceSchema) -> Result<Vec<Record>, AppError> {
        let tables = self.tables.read().await;
        let Some(table) = tables.get(&schema.table_name) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<(&i64, &StoredRow)> = table.rows.iter().collect();
        if schema.order == ListOrder::NewestFirst {
            rows.sort_by(|a, b| (b.1.created_at, b.1.seq).cmp(&(a.1.created_at, a.1.seq)));
        }
        Ok(rows.into_iter().map(|(id, row)| row.to_record(*id)).collect())
    }

    async fn get(&self, schema: &ResourceSchema, id: i64) -> Result<Option<Record>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&schema.table_name)
            .and_then(|t| t.rows.get(&id))
            .map(|row| row.to_record(id)))
    }

    async fn find_by_unique(&self, schema: &ResourceSchema, key: &str) -> Result<Option<Record>, AppError> {
        let Some(col) = &schema.unique_key else {
            return Ok(None);
        };
        let norm = schema.unique_normalize();
        let wanted = norm.apply(key);
        let tables = self.tables.read().await;
        Ok(tables.get(&schema.table_name).and_then(|t| {
            t.rows
                .iter()
                .find(|(_, row)| {
                    row.values.get(col).and_then(Value::as_str).map(|v| norm.apply(v)).as_deref() == Some(wanted.as_str())
                })
                .map(|(id, row)| row.to_record(*id))
        }))
    }

    async fn create(&self, schema: &ResourceSchema, record: &Record) -> Result<Allocation, AppError> {
        let mut tables = self.tables.write().await;
        let table = tables.entry(schema.table_name.clone()).or_default();
        if Self::unique_taken(table, schema, record, None) {
            return Err(AppError::Conflict(conflict_message(schema)));
        }
        let ids: Vec<i64> = table.rows.keys().copied().collect();
        let plan = Allocation::plan(&ids);
        let now = Utc::now();
        table.seq += 1;
        let seq = table.seq;
        table.rows.insert(
            plan.id,
            StoredRow {
                values: record.clone(),
                created_at: now,
                updated_at: now,
                seq,
            },
        );
        if self.fail_counter_advance.load(Ordering::SeqCst) {
            tracing::warn!(table = %schema.table_name, counter = plan.counter, "counter advance failed; row kept");
        } else {
            table.counter = plan.counter;
        }
        Ok(plan)
    }

    async fn update(&self, schema: &ResourceSchema, id: i64, record: &Record) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(&schema.table_name) else {
            return Ok(false);
        };
        if !table.rows.contains_key(&id) {
            return Ok(false);
        }
        if Self::unique_taken(table, schema, record, Some(id)) {
            return Err(AppError::Conflict(conflict_message(schema)));
        }
        if let Some(row) = table.rows.get_mut(&id) {
            for (k, v) in record {
                if schema.field(k).is_some() {
                    row.values.insert(k.clone(), v.clone());
                }
            }
            row.updated_at = Utc::now();
        }
        Ok(true)
    }

    async fn delete(&self, schema: &ResourceSchema, id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .get_mut(&schema.table_name)
            .map(|t| t.rows.remove(&id).is_some())
            .unwrap_or(false))
    }

    async fn count(&self, schema: &ResourceSchema) -> Result<u64, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.get(&schema.table_name).map(|t| t.rows.len() as u64).unwrap_or(0))
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
