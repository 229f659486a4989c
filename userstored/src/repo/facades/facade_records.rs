use std::sync::Arc;

use futures::TryStreamExt;
use log::{debug, info, trace};

use super::{FacadeError, MigrationOptions};
use crate::{
    params,
    repo::{Backend, Connector},
    traits::{KeyGenerator, UuidKeys},
    types::{BackendKind, DatabaseInfo, Record},
};

/// Uniform access to user records, whatever backend is configured.
///
/// The facade owns its backend handle for its whole lifetime, the backend is
/// chosen once at construction.
pub struct FacadeRecords {
    kind: BackendKind,
    pub(super) backend: Box<dyn Backend>,
    pub(super) connector: Arc<dyn Connector>,
    keys: Arc<dyn KeyGenerator>,
    pub(super) options: MigrationOptions,
}

impl FacadeRecords {
    /// Connects to the backend selected by the process environment.
    pub async fn from_env() -> Result<Self, FacadeError> {
        Self::new(params::Settings::from_env()?).await
    }

    /// Connects to `settings.backend`, further connections (e.g. migration
    /// targets) are built from the same settings.
    pub async fn new(settings: params::Settings) -> Result<Self, FacadeError> {
        let kind = settings.backend;
        let options = MigrationOptions::from(&settings);

        Ok(Self::connect(kind, Arc::new(settings))
            .await?
            .with_migration_options(options))
    }

    /// Connects to `kind` through `connector`.
    pub async fn connect(
        kind: BackendKind,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, FacadeError> {
        let backend = connector.connect(kind).await?;
        info!("record store bound to `{}`", kind);

        Ok(Self {
            kind,
            backend,
            connector,
            keys: Arc::new(UuidKeys),
            options: MigrationOptions::default(),
        })
    }

    /// Replaces the generator used for records created without a key.
    pub fn with_key_generator(mut self, keys: impl KeyGenerator + 'static) -> Self {
        self.keys = Arc::new(keys);
        self
    }

    pub fn with_migration_options(mut self, options: MigrationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Stores `record`, assigning it a fresh key when it has none.
    ///
    /// Returns the stored record. Key collisions are reported by the backend.
    pub async fn create_record(&self, mut record: Record) -> Result<Record, FacadeError> {
        let key = record.ensure_key(self.keys.as_ref())?;
        trace!("creating record `{}` on {}", key, self.kind);

        self.backend.insert_one(&record).await?;
        Ok(record)
    }

    /// Reads the whole collection.
    pub async fn get_all_records(&self) -> Result<Vec<Record>, FacadeError> {
        let records: Vec<Record> = self.backend.find_all().await?.try_collect().await?;
        debug!("read {} records from {}", records.len(), self.kind);
        Ok(records)
    }

    pub async fn get_record_by_key(&self, key: &str) -> Result<Option<Record>, FacadeError> {
        Ok(self.backend.find_by_key(key).await?)
    }

    /// Returns `true` if a record with `key` was removed.
    pub async fn delete_record_by_key(&self, key: &str) -> Result<bool, FacadeError> {
        let deleted = self.backend.delete_by_key(key).await?;
        if deleted {
            info!("record `{}` deleted from {}", key, self.kind);
        }
        Ok(deleted)
    }

    /// Selected backend, the connection itself is not checked.
    pub fn get_database_info(&self) -> DatabaseInfo {
        DatabaseInfo::new(self.kind)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::repo::testing::Cluster;

    async fn store(cluster: &Cluster, kind: BackendKind) -> FacadeRecords {
        FacadeRecords::connect(kind, Arc::new(cluster.clone()))
            .await
            .expect("unable to connect to the in-memory backend")
    }

    #[tokio::test]
    async fn create_without_key_assigns_uuid() {
        let cluster = Cluster::new();
        let store = store(&cluster, BackendKind::Mongodb).await;

        let a = store
            .create_record(Record::new().with_field("name", "alice"))
            .await
            .unwrap();
        let b = store
            .create_record(Record::new().with_field("name", "bob"))
            .await
            .unwrap();

        let key_a = a.key().unwrap();
        let key_b = b.key().unwrap();
        assert!(uuid::Uuid::parse_str(key_a).is_ok());
        assert!(uuid::Uuid::parse_str(key_b).is_ok());
        assert_ne!(key_a, key_b);
        assert_eq!(cluster.records(BackendKind::Mongodb).len(), 2);
    }

    #[tokio::test]
    async fn injected_keys_are_used() {
        let cluster = Cluster::new();
        let counter = AtomicUsize::new(0);
        let store = store(&cluster, BackendKind::Hcd)
            .await
            .with_key_generator(move || format!("user-{}", counter.fetch_add(1, Ordering::SeqCst)));

        let first = store.create_record(Record::new()).await.unwrap();
        let second = store
            .create_record(Record::try_from(json!({ "_id": "" })).unwrap())
            .await
            .unwrap();

        assert_eq!(first.key(), Some("user-0"));
        assert_eq!(second.key(), Some("user-1"));
    }

    #[tokio::test]
    async fn explicit_key_round_trip() {
        let cluster = Cluster::new();
        let store = store(&cluster, BackendKind::Mongodb).await;

        let record = Record::try_from(json!({
            "_id": "alice",
            "email": "alice@example.com",
            "profile": { "age": 31, "tags": ["admin"] }
        }))
        .unwrap();

        let created = store.create_record(record.clone()).await.unwrap();
        assert_eq!(created, record);

        let found = store.get_record_by_key("alice").await.unwrap();
        assert_eq!(found, Some(record));
    }

    #[tokio::test]
    async fn numeric_keys_are_stored_as_strings() {
        let cluster = Cluster::new();
        let store = store(&cluster, BackendKind::Mongodb).await;

        store
            .create_record(Record::try_from(json!({ "_id": 7 })).unwrap())
            .await
            .unwrap();

        assert!(store.get_record_by_key("7").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_keys_are_rejected() {
        let cluster = Cluster::new();
        let store = store(&cluster, BackendKind::Mongodb).await;

        store.create_record(Record::with_key("dup")).await.unwrap();
        let err = store.create_record(Record::with_key("dup")).await.unwrap_err();

        assert!(matches!(err, FacadeError::RepositoryError(_)));
        assert_eq!(cluster.records(BackendKind::Mongodb).len(), 1);
    }

    #[tokio::test]
    async fn missing_keys_are_absent() {
        let cluster = Cluster::new();
        let store = store(&cluster, BackendKind::Mongodb).await;

        assert_eq!(store.get_record_by_key("ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_once() {
        let cluster = Cluster::new();
        let store = store(&cluster, BackendKind::Mongodb).await;
        store.create_record(Record::with_key("k")).await.unwrap();

        assert!(store.delete_record_by_key("k").await.unwrap());
        assert!(!store.delete_record_by_key("k").await.unwrap());
        assert_eq!(store.get_record_by_key("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_all() {
        let cluster = Cluster::new();
        let store = store(&cluster, BackendKind::Astra).await;
        assert!(store.get_all_records().await.unwrap().is_empty());

        for key in ["a", "b", "c"] {
            store.create_record(Record::with_key(key)).await.unwrap();
        }

        let keys: Vec<String> = store
            .get_all_records()
            .await
            .unwrap()
            .iter()
            .map(|r| r.key_label())
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn database_info_is_stable() {
        let cluster = Cluster::new();
        let store = store(&cluster, BackendKind::Hcd).await;

        let info = store.get_database_info();
        assert_eq!(info.backend, BackendKind::Hcd);
        assert_eq!(info.status, "connected");

        store.create_record(Record::new()).await.unwrap();
        store.migrate(BackendKind::Mongodb, BackendKind::Hcd).await;
        assert_eq!(store.get_database_info(), info);
    }

    #[tokio::test]
    async fn connection_failures_are_reported() {
        let cluster = Cluster::new();
        cluster.refuse_connections(BackendKind::Astra);

        let result = FacadeRecords::connect(BackendKind::Astra, Arc::new(cluster)).await;
        assert!(matches!(result, Err(FacadeError::RepositoryError(_))));
    }

    #[tokio::test]
    async fn unknown_backend_from_settings() {
        let result = params::Settings::from_lookup(|key| {
            (key == params::env::DATABASE_TYPE).then(|| "sqlite".to_owned())
        });
        assert!(result.is_err());
    }
}
