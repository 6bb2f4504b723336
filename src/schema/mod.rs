//! Resource schemas: the field set, rules and keys each resource family supplies.

pub mod builtin;
pub mod catalog;
pub mod types;

pub use catalog::Catalog;
pub use types::*;
