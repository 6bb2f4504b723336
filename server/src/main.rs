//! Storefront API server.
//!
//! Run from repo root: `cargo run -p storefront-server`
//! `STORE=memory` serves from an in-process store without PostgreSQL.

use std::sync::Arc;
use storefront_api::{
    app, ensure_database_exists, ensure_tables, AppConfig, AppState, Catalog, MemoryStore, PgStore,
    ResourceStore, StoreKind,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    let catalog = match &config.schema_file {
        Some(path) => Catalog::builtin_with_json(&tokio::fs::read_to_string(path).await?)?,
        None => Catalog::builtin()?,
    };

    let store: Arc<dyn ResourceStore> = match config.store {
        StoreKind::Postgres => {
            ensure_database_exists(&config.database_url).await?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(&config.database_url)
                .await?;
            ensure_tables(&pool, &config.db_schema, &catalog).await?;
            Arc::new(PgStore::new(pool, config.db_schema.clone()))
        }
        StoreKind::Memory => {
            tracing::warn!("using in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    if config.legacy_plaintext_login {
        tracing::warn!("plain-text stored passwords are accepted at login (LEGACY_PLAINTEXT_LOGIN)");
    }

    let state = AppState::new(store, catalog).with_legacy_plaintext_login(config.legacy_plaintext_login);
    let router = app(state, config.cors_permissive);

    let listener = TcpListener::bind(config.listen_addr).await?;
    tracing::info!("storefront api listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}
