//! # Repository
//!
//! Storage layer of the crate. Every supported service implements the
//! [`Backend`] contract over its `users` collection:
//!
//! * [`MongoBackend`]: MongoDB, the primary document store.
//! * [`DataApiBackend`]: HCD and Astra DB through the Data API.
//!
//! Handles are produced by a [`Connector`]; the environment-backed
//! [`crate::params::Settings`] is the production one. Facades (see
//! [`FacadeRecords`]) sit on top and are the entry point for the rest of the
//! system.

mod error;
pub use error::*;

mod backend;
pub use backend::*;

mod connector;

mod mongo;
pub use mongo::MongoBackend;

pub mod data_api;
pub use data_api::DataApiBackend;

mod facades;
pub use facades::*;

#[cfg(any(test, feature = "testkit"))]
pub mod testing;
