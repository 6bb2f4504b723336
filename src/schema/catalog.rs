//! Catalog of resource schemas indexed by path segment, validated on construction.

use super::builtin;
use super::types::{FieldKind, ResourceSchema};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug)]
pub struct Catalog {
    pub schemas: Vec<ResourceSchema>,
    by_path: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(schemas: Vec<ResourceSchema>) -> Result<Self, ConfigError> {
        validate(&schemas)?;
        let by_path = schemas
            .iter()
            .enumerate()
            .map(|(i, s)| (s.path_segment.clone(), i))
            .collect();
        Ok(Catalog { schemas, by_path })
    }

    /// users + products.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::new(vec![builtin::users(), builtin::products()])
    }

    /// Builtins followed by schemas parsed from a JSON array.
    pub fn builtin_with_json(json: &str) -> Result<Self, ConfigError> {
        let extra: Vec<ResourceSchema> =
            serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))?;
        let mut schemas = vec![builtin::users(), builtin::products()];
        schemas.extend(extra);
        Self::new(schemas)
    }

    pub fn schema_by_path(&self, path: &str) -> Option<&ResourceSchema> {
        self.by_path.get(path).map(|&i| &self.schemas[i])
    }

    /// First schema with login settings.
    pub fn account_schema(&self) -> Option<&ResourceSchema> {
        self.schemas.iter().find(|s| s.account.is_some())
    }
}

/// Reserved column names managed by the store.
const RESERVED: &[&str] = &["id", "created_at", "updated_at"];

/// Path segments that would shadow fixed routes.
const RESERVED_PATHS: &[&str] = &["auth", "health", "ready", "version", "info"];

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

pub fn validate(schemas: &[ResourceSchema]) -> Result<(), ConfigError> {
    let mut paths = HashSet::new();
    let mut tables = HashSet::new();
    for s in schemas {
        if RESERVED_PATHS.contains(&s.path_segment.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "path_segment",
                value: s.path_segment.clone(),
            });
        }
        if !paths.insert(s.path_segment.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(s.path_segment.clone()));
        }
        if !is_identifier(&s.table_name) {
            return Err(ConfigError::InvalidValue {
                key: "table_name",
                value: s.table_name.clone(),
            });
        }
        if !tables.insert(s.table_name.as_str()) {
            return Err(ConfigError::DuplicateTableName(s.table_name.clone()));
        }
        let mut names = HashSet::new();
        for f in &s.fields {
            if !is_identifier(&f.name) || RESERVED.contains(&f.name.as_str()) || !names.insert(f.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    key: "field",
                    value: format!("{}.{}", s.table_name, f.name),
                });
            }
        }
        let credentials = s.fields.iter().filter(|f| f.kind == FieldKind::Credential).count();
        if credentials > 1 {
            return Err(ConfigError::InvalidValue {
                key: "credential",
                value: format!("{} declares {} credential fields", s.table_name, credentials),
            });
        }
        let known = |name: &str| name == "id" || s.field(name).is_some();
        if let Some(key) = &s.unique_key {
            if s.field(key).is_none() {
                return Err(ConfigError::UnknownField {
                    schema: s.table_name.clone(),
                    field: key.clone(),
                });
            }
        }
        if let Some(account) = &s.account {
            if s.unique_key.is_none() || s.credential_field().is_none() {
                return Err(ConfigError::InvalidValue {
                    key: "account",
                    value: format!("{} needs a unique key and a credential field", s.table_name),
                });
            }
            for name in std::iter::once(&account.status_field).chain(&account.profile_fields) {
                if !known(name) {
                    return Err(ConfigError::UnknownField {
                        schema: s.table_name.clone(),
                        field: name.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}
