//! # Facade Module
//!
//! Facades are the public entry point of the storage layer. They hide which
//! backend is in use and coordinate multi-step operations, such as copying
//! records across two backends, on top of the plain [`super::Backend`]
//! contract.

mod facade_error;
pub use facade_error::*;

mod facade_records;
pub use facade_records::*;

mod facade_migration;
pub use facade_migration::*;
