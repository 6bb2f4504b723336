//! Process configuration from the environment (`.env` is loaded by the binary).

use crate::error::ConfigError;
use std::net::SocketAddr;

/// Which `ResourceStore` backs the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreKind::Postgres),
            "memory" => Ok(StoreKind::Memory),
            _ => Err(ConfigError::InvalidValue {
                key: "STORE",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub store: StoreKind,
    pub database_url: String,
    /// PostgreSQL schema holding the resource tables.
    pub db_schema: String,
    pub db_max_connections: u32,
    /// Accept plain-text stored passwords at login (rows written before hashing).
    pub legacy_plaintext_login: bool,
    pub cors_permissive: bool,
    /// Optional JSON file with extra resource schemas.
    pub schema_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            log_level: "info".into(),
            store: StoreKind::Postgres,
            database_url: "postgres://localhost/storefront".into(),
            db_schema: "public".into(),
            db_max_connections: 5,
            legacy_plaintext_login: true,
            cors_permissive: true,
            schema_file: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = AppConfig::default();
        if let Some(v) = get("LISTEN_ADDR") {
            cfg.listen_addr = v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "LISTEN_ADDR",
                value: v.clone(),
            })?;
        }
        if let Some(v) = get("LOG_LEVEL") {
            cfg.log_level = v;
        }
        if let Some(v) = get("STORE") {
            cfg.store = v.parse()?;
        }
        if let Some(v) = get("DATABASE_URL") {
            cfg.database_url = v;
        }
        if let Some(v) = get("DB_SCHEMA") {
            if v.is_empty() || !v.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(ConfigError::InvalidValue { key: "DB_SCHEMA", value: v });
            }
            cfg.db_schema = v;
        }
        if let Some(v) = get("DB_MAX_CONNECTIONS") {
            cfg.db_max_connections = v
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidValue {
                    key: "DB_MAX_CONNECTIONS",
                    value: v,
                })?;
        }
        if let Some(v) = get("LEGACY_PLAINTEXT_LOGIN") {
            cfg.legacy_plaintext_login = parse_bool("LEGACY_PLAINTEXT_LOGIN", &v)?;
        }
        if let Some(v) = get("CORS_PERMISSIVE") {
            cfg.cors_permissive = parse_bool("CORS_PERMISSIVE", &v)?;
        }
        cfg.schema_file = get("SCHEMA_FILE").filter(|s| !s.is_empty());
        Ok(cfg)
    }
}

fn parse_bool(key: &'static str, v: &str) -> Result<bool, ConfigError> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: v.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = from(&[]).unwrap();
        assert_eq!(cfg.listen_addr.port(), 3000);
        assert_eq!(cfg.store, StoreKind::Postgres);
        assert!(cfg.legacy_plaintext_login);
        assert_eq!(cfg.db_schema, "public");
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = from(&[
            ("STORE", "memory"),
            ("LISTEN_ADDR", "0.0.0.0:8080"),
            ("LEGACY_PLAINTEXT_LOGIN", "false"),
            ("DB_MAX_CONNECTIONS", "12"),
        ])
        .unwrap();
        assert_eq!(cfg.store, StoreKind::Memory);
        assert_eq!(cfg.listen_addr.port(), 8080);
        assert!(!cfg.legacy_plaintext_login);
        assert_eq!(cfg.db_max_connections, 12);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(from(&[("STORE", "mysql")]).is_err());
        assert!(from(&[("DB_SCHEMA", "bad;schema")]).is_err());
        assert!(from(&[("CORS_PERMISSIVE", "maybe")]).is_err());
        assert!(from(&[("DB_MAX_CONNECTIONS", "0")]).is_err());
    }
}
