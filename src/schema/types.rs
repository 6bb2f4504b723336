//! Resource schema types: field set, validation rules, uniqueness key and ordering.

use serde::{Deserialize, Serialize};

/// Storage kind of a field; drives JSON shape checks and column types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Integer,
    /// Secret stored as a hash; never returned, optional on update.
    Credential,
}

impl FieldKind {
    pub fn pg_type(&self) -> &'static str {
        match self {
            FieldKind::Text | FieldKind::Credential => "TEXT",
            FieldKind::Number => "DOUBLE PRECISION",
            FieldKind::Integer => "BIGINT",
        }
    }
}

/// Normalisation applied to text values before validation and storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalize {
    #[default]
    None,
    Trim,
    TrimLowercase,
}

impl Normalize {
    pub fn apply(&self, s: &str) -> String {
        match self {
            Normalize::None => s.to_string(),
            Normalize::Trim => s.trim().to_string(),
            Normalize::TrimLowercase => s.trim().to_lowercase(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub normalize: Normalize,
    #[serde(default)]
    pub rule: ValidationRule,
    /// Stored when the field is omitted or empty.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

impl FieldSpec {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        FieldSpec {
            name: name.to_string(),
            kind,
            normalize: Normalize::None,
            rule: ValidationRule::default(),
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.rule.required = true;
        self
    }

    pub fn normalize(mut self, normalize: Normalize) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn format(mut self, format: &str) -> Self {
        self.rule.format = Some(format.to_string());
        self
    }

    pub fn min_length(mut self, n: u32) -> Self {
        self.rule.min_length = Some(n);
        self
    }

    pub fn minimum(mut self, n: f64) -> Self {
        self.rule.minimum = Some(n);
        self
    }

    pub fn allowed(mut self, values: &[&str]) -> Self {
        self.rule.allowed = Some(values.iter().map(|v| serde_json::Value::from(*v)).collect());
        self
    }

    pub fn default_value(mut self, v: impl Into<serde_json::Value>) -> Self {
        self.default = Some(v.into());
        self
    }

    pub fn is_credential(&self) -> bool {
        self.kind == FieldKind::Credential
    }
}

/// Default ordering for list().
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListOrder {
    /// Ascending id, which is insertion order for a gap-free table.
    #[default]
    IdAsc,
    NewestFirst,
}

/// Login settings for account-like resources.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountSpec {
    /// Field that must equal `active_value` for login to be allowed.
    pub status_field: String,
    pub active_value: String,
    /// Fields returned as the logged-in account.
    pub profile_fields: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceSchema {
    /// Singular display name used in messages, e.g. "user".
    pub label: String,
    pub table_name: String,
    pub path_segment: String,
    pub fields: Vec<FieldSpec>,
    /// Field with a uniqueness constraint, also the login lookup key.
    #[serde(default)]
    pub unique_key: Option<String>,
    #[serde(default)]
    pub order: ListOrder,
    #[serde(default)]
    pub account: Option<AccountSpec>,
}

impl ResourceSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn credential_field(&self) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.is_credential())
    }

    /// Normalisation of the unique key. Uniqueness and lookups compare values under it.
    pub fn unique_normalize(&self) -> Normalize {
        self.unique_key
            .as_deref()
            .and_then(|k| self.field(k))
            .map(|f| f.normalize)
            .unwrap_or_default()
    }

    /// Capitalised label for response messages.
    pub fn title(&self) -> String {
        let mut chars = self.label.chars();
        match chars.next() {
            Some(c) => c.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}
