//! PostgreSQL store. Create runs id scan, insert and counter advance in one
//! transaction; the advance sits in a savepoint so its failure cannot undo the row.

use super::{conflict_message, sql, Record, ResourceStore, MAX_ALLOCATION_ATTEMPTS};
use crate::allocator::Allocation;
use crate::error::AppError;
use crate::schema::ResourceSchema;
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    /// Database schema holding the resource tables.
    db_schema: String,
}

impl PgStore {
    pub fn new(pool: PgPool, db_schema: impl Into<String>) -> Self {
        PgStore {
            pool,
            db_schema: db_schema.into(),
        }
    }

    /// Swallows failures: the inserted row stands whether or not the sequence moved.
    async fn advance_counter(&self, conn: &mut PgConnection, schema: &ResourceSchema, counter: i64) {
        let table = sql::qualified_table(&self.db_schema, &schema.table_name);
        let result: Result<(), sqlx::Error> = async {
            let mut savepoint = sqlx::Connection::begin(&mut *conn).await?;
            sqlx::query(sql::ADVANCE_COUNTER)
                .bind(&table)
                .bind(counter)
                .execute(&mut *savepoint)
                .await?;
            savepoint.commit().await
        }
        .await;
        if let Err(e) = result {
            tracing::warn!(table = %table, counter, error = %e, "counter advance failed; row kept");
        }
    }

    /// Whether `constraint` is the primary key of the schema's table, by catalog lookup,
    /// so renamed or truncated constraint names are still recognised.
    async fn is_primary_key_constraint(&self, schema: &ResourceSchema, constraint: &str) -> Result<bool, AppError> {
        let table = sql::qualified_table(&self.db_schema, &schema.table_name);
        let found: bool = sqlx::query_scalar(sql::IS_PRIMARY_KEY_CONSTRAINT)
            .bind(constraint)
            .bind(&table)
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }
}

/// Constraint named by a unique violation, if `e` is one.
fn unique_violation(e: &sqlx::Error) -> Option<Option<String>> {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => Some(db.constraint().map(str::to_string)),
        _ => None,
    }
}

/// Unique violations become Conflict; everything else stays a database error.
fn map_db_error(schema: &ResourceSchema, e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return AppError::Conflict(conflict_message(schema));
        }
    }
    AppError::Db(e)
}

#[async_trait]
impl ResourceStore for PgStore {
    async fn list(&self, schema: &ResourceSchema) -> Result<Vec<Record>, AppError> {
        let q = sql::select_list(&self.db_schema, schema);
        tracing::debug!(sql = %q.sql, "query");
        let rows = q.query().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| sql::row_to_record(schema, r).map_err(AppError::Db))
            .collect()
    }

    async fn get(&self, schema: &ResourceSchema, id: i64) -> Result<Option<Record>, AppError> {
        let q = sql::select_by_id(&self.db_schema, schema, id);
        tracing::debug!(sql = %q.sql, id, "query");
        let row = q.query().fetch_optional(&self.pool).await?;
        row.map(|r| sql::row_to_record(schema, &r))
            .transpose()
            .map_err(AppError::Db)
    }

    async fn find_by_unique(&self, schema: &ResourceSchema, key: &str) -> Result<Option<Record>, AppError> {
        let Some(column) = &schema.unique_key else {
            return Ok(None);
        };
        let q = sql::select_by_unique(&self.db_schema, schema, column, key);
        tracing::debug!(sql = %q.sql, "query");
        let row = q.query().fetch_optional(&self.pool).await?;
        row.map(|r| sql::row_to_record(schema, &r))
            .transpose()
            .map_err(AppError::Db)
    }

    async fn create(&self, schema: &ResourceSchema, record: &Record) -> Result<Allocation, AppError> {
        let ids_sql = sql::select_ids(&self.db_schema, schema);
        let mut attempt = 1;
        loop {
            let mut tx = self.pool.begin().await?;
            let ids: Vec<i64> = sqlx::query_scalar(&ids_sql).fetch_all(&mut *tx).await?;
            let plan = Allocation::plan(&ids);
            let q = sql::insert_with_id(&self.db_schema, schema, plan.id, record);
            tracing::debug!(sql = %q.sql, id = plan.id, attempt, "query (tx)");
            if let Err(e) = q.query().execute(&mut *tx).await {
                let Some(constraint) = unique_violation(&e) else {
                    return Err(AppError::Db(e));
                };
                tx.rollback().await?;
                let id_taken = match &constraint {
                    Some(name) => self.is_primary_key_constraint(schema, name).await?,
                    None => false,
                };
                if !id_taken {
                    return Err(AppError::Conflict(conflict_message(schema)));
                }
                if attempt >= MAX_ALLOCATION_ATTEMPTS {
                    return Err(AppError::Conflict(format!(
                        "could not allocate a {} id after {} attempts",
                        schema.label, MAX_ALLOCATION_ATTEMPTS
                    )));
                }
                // A concurrent creator took the same gap; scan again.
                tracing::warn!(table = %schema.table_name, id = plan.id, attempt, "id taken concurrently, retrying");
                attempt += 1;
                continue;
            }
            self.advance_counter(&mut tx, schema, plan.counter).await;
            tx.commit().await?;
            return Ok(plan);
        }
    }

    async fn update(&self, schema: &ResourceSchema, id: i64, record: &Record) -> Result<bool, AppError> {
        let q = sql::update(&self.db_schema, schema, id, record);
        tracing::debug!(sql = %q.sql, id, "query");
        let result = q
            .query()
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(schema, e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, schema: &ResourceSchema, id: i64) -> Result<bool, AppError> {
        let q = sql::delete(&self.db_schema, schema, id);
        tracing::debug!(sql = %q.sql, id, "query");
        let result = q.query().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, schema: &ResourceSchema) -> Result<u64, AppError> {
        let n: i64 = sqlx::query_scalar(&sql::count(&self.db_schema, schema))
            .fetch_one(&self.pool)
            .await?;
        Ok(n.max(0) as u64)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}
