//! ResourceService: generic CRUD over the injected store. AuthService: login.

mod auth;
mod crud;
mod validation;
pub use auth::AuthService;
pub use crud::{parse_id, strip_sensitive, ResourceService};
pub use validation::{RequestValidator, WriteMode};
