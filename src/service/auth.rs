//! Login and session re-check for account-like resources.

use crate::credentials::{self, CredentialMatch};
use crate::error::AppError;
use crate::schema::{AccountSpec, ResourceSchema};
use crate::store::{Record, ResourceStore};
use serde_json::Value;

const BAD_CREDENTIALS: &str = "invalid credentials";

pub struct AuthService;

impl AuthService {
    /// Authenticate by unique key and password. Unknown key or wrong password is
    /// Unauthorized; a known but disabled account is Forbidden.
    pub async fn login(
        store: &dyn ResourceStore,
        schema: &ResourceSchema,
        lookup_key: &str,
        password: &str,
        allow_legacy: bool,
    ) -> Result<Record, AppError> {
        let account = account_spec(schema)?;
        if lookup_key.trim().is_empty() || password.is_empty() {
            return Err(AppError::Validation(format!(
                "{} and {} are required",
                schema.unique_key.as_deref().unwrap_or("key"),
                credential_name(schema)
            )));
        }
        let row = store
            .find_by_unique(schema, lookup_key)
            .await?
            .ok_or_else(|| AppError::Unauthorized(BAD_CREDENTIALS.into()))?;
        ensure_active(account, &row)?;

        let stored = row
            .get(credential_name(schema))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let supplied = password.to_string();
        let outcome = tokio::task::spawn_blocking(move || credentials::check(&supplied, &stored, allow_legacy))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        match outcome {
            CredentialMatch::Mismatch => return Err(AppError::Unauthorized(BAD_CREDENTIALS.into())),
            CredentialMatch::LegacyPlaintext => {
                tracing::warn!(
                    resource = %schema.label,
                    id = ?row.get("id"),
                    "login accepted via plain-text credential; row needs a password reset"
                );
            }
            CredentialMatch::LegacyBcrypt => {
                tracing::warn!(
                    resource = %schema.label,
                    id = ?row.get("id"),
                    "login accepted via bcrypt credential; row needs rehashing"
                );
            }
            CredentialMatch::Hashed => {}
        }
        tracing::info!(resource = %schema.label, id = ?row.get("id"), "login");
        Ok(profile(account, &row))
    }

    /// Re-check a remembered session: the account must still exist and be active.
    pub async fn verify(store: &dyn ResourceStore, schema: &ResourceSchema, lookup_key: &str) -> Result<Record, AppError> {
        let account = account_spec(schema)?;
        if lookup_key.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "{} is required",
                schema.unique_key.as_deref().unwrap_or("key")
            )));
        }
        let row = store
            .find_by_unique(schema, lookup_key)
            .await?
            .ok_or_else(|| AppError::Unauthorized("invalid session".into()))?;
        ensure_active(account, &row)?;
        Ok(profile(account, &row))
    }
}

fn account_spec(schema: &ResourceSchema) -> Result<&AccountSpec, AppError> {
    schema
        .account
        .as_ref()
        .ok_or_else(|| AppError::Internal(format!("{} has no login settings", schema.label)))
}

fn credential_name(schema: &ResourceSchema) -> &str {
    schema.credential_field().map(|f| f.name.as_str()).unwrap_or("password")
}

fn ensure_active(account: &AccountSpec, row: &Record) -> Result<(), AppError> {
    let status = row.get(&account.status_field).and_then(Value::as_str);
    if status != Some(account.active_value.as_str()) {
        return Err(AppError::Forbidden("account is disabled".into()));
    }
    Ok(())
}

/// Only the profile fields; the credential is never among them.
fn profile(account: &AccountSpec, row: &Record) -> Record {
    account
        .profile_fields
        .iter()
        .filter_map(|f| row.get(f).map(|v| (f.clone(), v.clone())))
        .collect()
}
