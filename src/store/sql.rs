//! Parameterized SQL for resource tables: identifiers come from schemas only, values are bound.

use super::Record;
use crate::schema::{FieldKind, ListOrder, Normalize, ResourceSchema};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::Postgres;

/// A value bound with the column's own type, so NULLs stay typed too.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Text(Option<String>),
    Float(Option<f64>),
    Int(Option<i64>),
}

impl PgBindValue {
    pub fn from_json(kind: FieldKind, v: &Value) -> Self {
        match kind {
            FieldKind::Text | FieldKind::Credential => PgBindValue::Text(match v {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            }),
            FieldKind::Number => PgBindValue::Float(v.as_f64()),
            FieldKind::Integer => PgBindValue::Int(v.as_i64()),
        }
    }

    pub fn bind<'q>(self, query: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments> {
        match self {
            PgBindValue::Text(v) => query.bind(v),
            PgBindValue::Float(v) => query.bind(v),
            PgBindValue::Int(v) => query.bind(v),
        }
    }
}

/// Quote identifier for PostgreSQL (safe: only from schemas).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(db_schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(db_schema), quoted(table))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: PgBindValue) -> u32 {
        self.params.push(v);
        self.params.len() as u32
    }

    pub fn query(&self) -> Query<'_, Postgres, PgArguments> {
        self.params
            .iter()
            .cloned()
            .fold(sqlx::query(&self.sql), |q, p| p.bind(q))
    }
}

/// id, every field, then the timestamps.
fn select_column_list(schema: &ResourceSchema) -> String {
    std::iter::once(quoted("id"))
        .chain(schema.fields.iter().map(|f| quoted(&f.name)))
        .chain([quoted("created_at"), quoted("updated_at")])
        .collect::<Vec<_>>()
        .join(", ")
}

fn order_clause(schema: &ResourceSchema) -> String {
    match schema.order {
        ListOrder::IdAsc => format!(" ORDER BY {}", quoted("id")),
        ListOrder::NewestFirst => format!(" ORDER BY {} DESC, {} DESC", quoted("created_at"), quoted("id")),
    }
}

pub fn select_list(db_schema: &str, schema: &ResourceSchema) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {}{}",
        select_column_list(schema),
        qualified_table(db_schema, &schema.table_name),
        order_clause(schema)
    );
    q
}

pub fn select_by_id(db_schema: &str, schema: &ResourceSchema, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(PgBindValue::Int(Some(id)));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = ${}",
        select_column_list(schema),
        qualified_table(db_schema, &schema.table_name),
        quoted("id"),
        n
    );
    q
}

/// Lookup on the unique key. Both sides go through the key field's normalisation.
pub fn select_by_unique(db_schema: &str, schema: &ResourceSchema, key_column: &str, key: &str) -> QueryBuf {
    let norm = schema.unique_normalize();
    let column = match norm {
        Normalize::None => quoted(key_column),
        Normalize::Trim => format!("TRIM({})", quoted(key_column)),
        Normalize::TrimLowercase => format!("LOWER(TRIM({}))", quoted(key_column)),
    };
    let mut q = QueryBuf::new();
    let n = q.push_param(PgBindValue::Text(Some(norm.apply(key))));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = ${} LIMIT 1",
        select_column_list(schema),
        qualified_table(db_schema, &schema.table_name),
        column,
        n
    );
    q
}

pub fn select_ids(db_schema: &str, schema: &ResourceSchema) -> String {
    format!(
        "SELECT {} FROM {} ORDER BY {}",
        quoted("id"),
        qualified_table(db_schema, &schema.table_name),
        quoted("id")
    )
}

pub fn count(db_schema: &str, schema: &ResourceSchema) -> String {
    format!("SELECT COUNT(*) FROM {}", qualified_table(db_schema, &schema.table_name))
}

/// INSERT with an explicit id; fields missing from `record` are bound as NULL.
pub fn insert_with_id(db_schema: &str, schema: &ResourceSchema, id: i64, record: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = vec![quoted("id")];
    let mut placeholders = vec![format!("${}", q.push_param(PgBindValue::Int(Some(id))))];
    for f in &schema.fields {
        let v = record.get(&f.name).unwrap_or(&Value::Null);
        let n = q.push_param(PgBindValue::from_json(f.kind, v));
        cols.push(quoted(&f.name));
        placeholders.push(format!("${}", n));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualified_table(db_schema, &schema.table_name),
        cols.join(", "),
        placeholders.join(", ")
    );
    q
}

/// UPDATE by id: SET only schema fields present in `record`, plus updated_at.
pub fn update(db_schema: &str, schema: &ResourceSchema, id: i64, record: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for f in &schema.fields {
        let Some(v) = record.get(&f.name) else { continue };
        let n = q.push_param(PgBindValue::from_json(f.kind, v));
        sets.push(format!("{} = ${}", quoted(&f.name), n));
    }
    sets.push(format!("{} = NOW()", quoted("updated_at")));
    let id_param = q.push_param(PgBindValue::Int(Some(id)));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}",
        qualified_table(db_schema, &schema.table_name),
        sets.join(", "),
        quoted("id"),
        id_param
    );
    q
}

pub fn delete(db_schema: &str, schema: &ResourceSchema, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(PgBindValue::Int(Some(id)));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ${}",
        qualified_table(db_schema, &schema.table_name),
        quoted("id"),
        n
    );
    q
}

/// `$1` constraint name, `$2` qualified table. True when it is that table's primary key.
pub const IS_PRIMARY_KEY_CONSTRAINT: &str = "SELECT EXISTS (SELECT 1 FROM pg_constraint \
     WHERE conname = $1 AND contype = 'p' AND conrelid = to_regclass($2))";

/// Sets the id sequence so the next generated value is `$2`.
pub const ADVANCE_COUNTER: &str = "SELECT setval(pg_get_serial_sequence($1, 'id'), $2, false)";

pub fn row_to_record(schema: &ResourceSchema, row: &PgRow) -> Result<Record, sqlx::Error> {
    use sqlx::Row;
    let mut out = Record::new();
    out.insert("id".into(), Value::from(row.try_get::<i64, _>("id")?));
    for f in &schema.fields {
        let name = f.name.as_str();
        let v = match f.kind {
            FieldKind::Text | FieldKind::Credential => row
                .try_get::<Option<String>, _>(name)?
                .map(Value::String),
            FieldKind::Number => row
                .try_get::<Option<f64>, _>(name)?
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            FieldKind::Integer => row.try_get::<Option<i64>, _>(name)?.map(Value::from),
        };
        out.insert(f.name.clone(), v.unwrap_or(Value::Null));
    }
    for ts in ["created_at", "updated_at"] {
        let v = row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(ts)?
            .map(|d| Value::String(d.to_rfc3339()))
            .unwrap_or(Value::Null);
        out.insert(ts.into(), v);
    }
    Ok(out)
}
