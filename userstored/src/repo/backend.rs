use async_trait::async_trait;
use futures::stream::BoxStream;

use super::Error;
use crate::types::{BackendKind, Record};

/// Stream of records produced by a full collection scan.
pub type RecordStream<'a> = BoxStream<'a, Result<Record, Error>>;

/// Operations every storage backend exposes over its `users` collection.
///
/// Setup is backend specific and happens in each implementation's
/// constructor; once built, a handle only needs to move records in and out.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Inserts a single record, failing on key collision.
    async fn insert_one(&self, record: &Record) -> Result<(), Error>;

    /// Inserts all `records` with one bulk request. The request fails as a
    /// whole if any record is rejected.
    async fn insert_many(&self, records: &[Record]) -> Result<(), Error>;

    /// Opens a cursor over the whole collection, no filter and no ordering.
    async fn find_all(&self) -> Result<RecordStream<'_>, Error>;

    async fn find_by_key(&self, key: &str) -> Result<Option<Record>, Error>;

    /// Deletes at most one record, returns `true` if a record was removed.
    async fn delete_by_key(&self, key: &str) -> Result<bool, Error>;
}

/// Builds backend handles on demand.
///
/// Each call returns a fresh, independently owned handle.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, kind: BackendKind) -> Result<Box<dyn Backend>, Error>;
}
