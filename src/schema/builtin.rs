//! Built-in schemas: user accounts and catalog products.

use super::types::{AccountSpec, FieldKind, FieldSpec, ListOrder, Normalize, ResourceSchema};

pub const ROLE_VALUES: &[&str] = &["admin", "user"];
pub const STATUS_VALUES: &[&str] = &["active", "inactive"];
pub const ACTIVE: &str = "active";

/// Same shape the frontend validates against: something@something.tld, no whitespace.
pub const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

pub fn users() -> ResourceSchema {
    ResourceSchema {
        label: "user".into(),
        table_name: "users".into(),
        path_segment: "users".into(),
        fields: vec![
            FieldSpec::new("name", FieldKind::Text)
                .required()
                .normalize(Normalize::Trim)
                .min_length(3),
            FieldSpec::new("email", FieldKind::Text)
                .required()
                .normalize(Normalize::TrimLowercase)
                .format("email"),
            FieldSpec::new("password", FieldKind::Credential).required(),
            FieldSpec::new("role", FieldKind::Text)
                .required()
                .allowed(ROLE_VALUES),
            FieldSpec::new("status", FieldKind::Text)
                .required()
                .allowed(STATUS_VALUES),
        ],
        unique_key: Some("email".into()),
        order: ListOrder::IdAsc,
        account: Some(AccountSpec {
            status_field: "status".into(),
            active_value: ACTIVE.into(),
            profile_fields: vec!["id".into(), "name".into(), "email".into(), "role".into()],
        }),
    }
}

pub fn products() -> ResourceSchema {
    ResourceSchema {
        label: "product".into(),
        table_name: "products".into(),
        path_segment: "products".into(),
        fields: vec![
            FieldSpec::new("name", FieldKind::Text)
                .required()
                .normalize(Normalize::Trim),
            FieldSpec::new("description", FieldKind::Text).default_value(""),
            FieldSpec::new("price", FieldKind::Number).required().minimum(0.0),
            FieldSpec::new("stock", FieldKind::Integer).required().minimum(0.0),
            FieldSpec::new("category", FieldKind::Text)
                .normalize(Normalize::Trim)
                .default_value("General"),
            FieldSpec::new("image_url", FieldKind::Text)
                .normalize(Normalize::Trim)
                .default_value("https://via.placeholder.com/200"),
            FieldSpec::new("status", FieldKind::Text)
                .allowed(STATUS_VALUES)
                .default_value(ACTIVE),
        ],
        unique_key: None,
        order: ListOrder::NewestFirst,
        account: None,
    }
}
