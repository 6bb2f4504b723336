//! Shared application state for all routes. The store is injected, never global.

use crate::schema::Catalog;
use crate::store::ResourceStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ResourceStore>,
    pub catalog: Arc<Catalog>,
    /// Accept plain-text stored passwords at login.
    pub legacy_plaintext_login: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn ResourceStore>, catalog: Catalog) -> Self {
        AppState {
            store,
            catalog: Arc::new(catalog),
            legacy_plaintext_login: true,
        }
    }

    pub fn with_legacy_plaintext_login(mut self, allow: bool) -> Self {
        self.legacy_plaintext_login = allow;
        self
    }
}
