//! Storefront API: schema-driven REST backend for users and products.
//!
//! Every resource family shares one CRUD layer; new rows take the smallest free
//! positive id and the table's auto-increment counter is kept past the highest id.

pub mod allocator;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod state;
pub mod store;

pub use allocator::{next_available_id, Allocation};
pub use config::{AppConfig, StoreKind};
pub use error::{AppError, ConfigError};
pub use routes::{app, auth_routes, common_routes, resource_routes};
pub use schema::{Catalog, ResourceSchema};
pub use service::{AuthService, ResourceService};
pub use state::AppState;
pub use store::{ensure_database_exists, ensure_tables, MemoryStore, PgStore, Record, ResourceStore};
