//! Resource table DDL and database bootstrap.

use super::sql::{qualified_table, quoted};
use crate::error::AppError;
use crate::schema::{Catalog, ResourceSchema};
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

fn column_def(schema: &ResourceSchema, field: &crate::schema::FieldSpec) -> String {
    let not_null = if field.rule.required { " NOT NULL" } else { "" };
    let unique = if schema.unique_key.as_deref() == Some(field.name.as_str()) {
        " UNIQUE"
    } else {
        ""
    };
    format!("{} {}{}{}", quoted(&field.name), field.kind.pg_type(), not_null, unique)
}

/// CREATE TABLE statement for one schema: BIGSERIAL id, one column per field, timestamps.
pub fn create_table_sql(db_schema: &str, schema: &ResourceSchema) -> String {
    let mut defs = vec![format!("{} BIGSERIAL PRIMARY KEY", quoted("id"))];
    defs.extend(schema.fields.iter().map(|f| column_def(schema, f)));
    defs.push(format!("{} TIMESTAMPTZ NOT NULL DEFAULT NOW()", quoted("created_at")));
    defs.push(format!("{} TIMESTAMPTZ NOT NULL DEFAULT NOW()", quoted("updated_at")));
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        qualified_table(db_schema, &schema.table_name),
        defs.join(",\n    ")
    )
}

/// Create the database schema if needed, then one table per catalog schema.
/// Fields added to a schema after its table exists are added as nullable columns.
pub async fn ensure_tables(pool: &PgPool, db_schema: &str, catalog: &Catalog) -> Result<(), AppError> {
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(db_schema)))
        .execute(pool)
        .await?;

    for schema in &catalog.schemas {
        sqlx::query(&create_table_sql(db_schema, schema)).execute(pool).await?;
        let table = qualified_table(db_schema, &schema.table_name);
        for f in &schema.fields {
            let alter = format!(
                "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {}",
                table,
                quoted(&f.name),
                f.kind.pg_type()
            );
            let _ = sqlx::query(&alter).execute(pool).await;
        }
        tracing::debug!(table = %table, "resource table ready");
    }
    Ok(())
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await.map_err(AppError::Db)?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await
        .map_err(AppError::Db)?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)))
            .execute(&mut conn)
            .await
            .map_err(AppError::Db)?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url.rfind('/').ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))? + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = format!("{}postgres", base);
    Ok((admin_url, db_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtin;

    #[test]
    fn users_table_has_unique_email() {
        let ddl = create_table_sql("public", &builtin::users());
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"public\".\"users\""));
        assert!(ddl.contains("\"id\" BIGSERIAL PRIMARY KEY"));
        assert!(ddl.contains("\"email\" TEXT NOT NULL UNIQUE"));
        assert!(ddl.contains("\"created_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW()"));
    }

    #[test]
    fn products_table_column_types() {
        let ddl = create_table_sql("shop", &builtin::products());
        assert!(ddl.contains("\"price\" DOUBLE PRECISION NOT NULL"));
        assert!(ddl.contains("\"stock\" BIGINT NOT NULL"));
        assert!(ddl.contains("\"description\" TEXT,"));
    }

    #[test]
    fn database_name_parsed_from_url() {
        let (admin, name) = parse_db_name_from_url("postgres://u:p@localhost:5432/storefront?sslmode=disable").unwrap();
        assert_eq!(admin, "postgres://u:p@localhost:5432/postgres");
        assert_eq!(name, "storefront");
    }
}
