//! Request validation and normalisation from schema rules.

use crate::error::AppError;
use crate::schema::builtin::EMAIL_PATTERN;
use crate::schema::{FieldKind, FieldSpec, ResourceSchema, ValidationRule};
use crate::store::Record;
use regex::Regex;
use serde_json::{Map, Value};

/// Which write the body is validated for. Credentials are optional on update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
}

pub struct RequestValidator;

impl RequestValidator {
    /// Validate `body` against every field of `schema` and return the normalised record.
    ///
    /// The record holds every non-credential field (omitted optional fields take their
    /// default or null). The credential is present only when supplied, still in plain
    /// text; callers hash it before it reaches a store. Unknown keys are dropped.
    pub fn validate(
        body: &Map<String, Value>,
        schema: &ResourceSchema,
        mode: WriteMode,
    ) -> Result<Record, AppError> {
        let mut record = Record::new();
        for field in &schema.fields {
            let value = normalized(field, body.get(&field.name))?;
            match value {
                Some(v) => {
                    let v = coerce(field, v)?;
                    validate_field(&field.name, &v, &field.rule)?;
                    record.insert(field.name.clone(), v);
                }
                None if field.is_credential() => {
                    if mode == WriteMode::Create && field.rule.required {
                        return Err(AppError::Validation(format!("{} is required", field.name)));
                    }
                }
                None if field.rule.required => {
                    return Err(AppError::Validation(format!("{} is required", field.name)));
                }
                None => {
                    record.insert(field.name.clone(), field.default.clone().unwrap_or(Value::Null));
                }
            }
        }
        Ok(record)
    }
}

/// Applies the field's normalisation. Null, absent and empty strings come back as None.
fn normalized(field: &FieldSpec, raw: Option<&Value>) -> Result<Option<Value>, AppError> {
    Ok(match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => {
            let s = field.normalize.apply(s);
            if s.is_empty() {
                None
            } else {
                Some(Value::String(s))
            }
        }
        Some(other) => Some(other.clone()),
    })
}

/// Checks the JSON shape against the field kind. Numeric strings are accepted for numbers.
fn coerce(field: &FieldSpec, v: Value) -> Result<Value, AppError> {
    let name = &field.name;
    match field.kind {
        FieldKind::Text | FieldKind::Credential => match v {
            Value::String(_) => Ok(v),
            _ => Err(AppError::Validation(format!("{} must be a string", name))),
        },
        FieldKind::Number => {
            let n = match &v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
                _ => None,
            };
            n.and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| AppError::Validation(format!("{} must be a number", name)))
        }
        FieldKind::Integer => {
            let n = match &v {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15).map(|f| f as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            n.map(Value::from)
                .ok_or_else(|| AppError::Validation(format!("{} must be an integer", name)))
        }
    }
}

fn validate_field(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    if let Some(format) = &rule.format {
        validate_format(col, v, format)?;
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at least {} characters",
                    col, min
                )));
            }
        }
        if let Some(ref pattern) = rule.pattern {
            let re = Regex::new(pattern).map_err(|_| AppError::Validation(format!("invalid pattern for {}", col)))?;
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} does not match required pattern", col)));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            let names: Vec<String> = allowed
                .iter()
                .map(|a| a.as_str().map(String::from).unwrap_or_else(|| a.to_string()))
                .collect();
            return Err(AppError::Validation(format!(
                "{} must be one of: {}",
                col,
                names.join(", ")
            )));
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                return Err(AppError::Validation(format!("{} must be at least {}", col, min)));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                return Err(AppError::Validation(format!("{} must be at most {}", col, max)));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str) -> Result<(), AppError> {
    if format.eq_ignore_ascii_case("email") {
        if let Some(s) = v.as_str() {
            let re = Regex::new(EMAIL_PATTERN).map_err(|e| AppError::Internal(e.to_string()))?;
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} must be a valid email", col)));
            }
        }
    }
    Ok(())
}
