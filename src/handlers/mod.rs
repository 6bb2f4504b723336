//! HTTP handlers for resource CRUD and authentication.

pub mod auth;
pub mod resource;
