//! In-memory backends used to exercise facades without a running database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;

use super::{Backend, Connector, Error, RecordStream};
use crate::types::{BackendKind, Record};

#[derive(Debug, Default)]
struct State {
    records: Vec<Record>,
    /// Size of every bulk insert received, accepted or not
    bulk_inserts: Vec<usize>,
    refuse_connections: bool,
}

type SharedState = Arc<Mutex<State>>;

fn lock(state: &SharedState) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A set of in-memory backends, one per [`BackendKind`].
///
/// Handles obtained from the same cluster share their data, so records
/// written through one facade are visible from any other.
#[derive(Debug, Clone, Default)]
pub struct Cluster {
    stores: Arc<Mutex<HashMap<BackendKind, SharedState>>>,
}

impl Cluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self, kind: BackendKind) -> SharedState {
        self.stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .clone()
    }

    pub fn backend(&self, kind: BackendKind) -> MemoryBackend {
        MemoryBackend {
            state: self.state(kind),
        }
    }

    /// Stores `records` as they are, bypassing key checks.
    pub fn seed(&self, kind: BackendKind, records: impl IntoIterator<Item = Record>) {
        lock(&self.state(kind)).records.extend(records);
    }

    pub fn records(&self, kind: BackendKind) -> Vec<Record> {
        lock(&self.state(kind)).records.clone()
    }

    pub fn bulk_inserts(&self, kind: BackendKind) -> Vec<usize> {
        lock(&self.state(kind)).bulk_inserts.clone()
    }

    /// Makes every following connection attempt to `kind` fail.
    pub fn refuse_connections(&self, kind: BackendKind) {
        lock(&self.state(kind)).refuse_connections = true;
    }
}

#[async_trait]
impl Connector for Cluster {
    async fn connect(&self, kind: BackendKind) -> Result<Box<dyn Backend>, Error> {
        let backend = self.backend(kind);
        if lock(&backend.state).refuse_connections {
            return Err(Error::Backend(format!("connection to {kind} refused")));
        }
        Ok(Box::new(backend))
    }
}

/// Backend keeping records in insertion order.
///
/// Bulk inserts are all-or-nothing: a single taken key rejects the whole
/// request and nothing is stored.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    state: SharedState,
}

fn duplicate(key: &str) -> Error {
    Error::Backend(format!("duplicate key `{key}`"))
}

impl State {
    fn contains(&self, key: &str) -> bool {
        self.records.iter().any(|r| r.key() == Some(key))
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn insert_one(&self, record: &Record) -> Result<(), Error> {
        let mut state = lock(&self.state);
        let key = record.key_label();
        if state.contains(&key) {
            return Err(duplicate(&key));
        }
        state.records.push(record.clone());
        Ok(())
    }

    async fn insert_many(&self, records: &[Record]) -> Result<(), Error> {
        let mut state = lock(&self.state);
        state.bulk_inserts.push(records.len());

        let taken = records
            .iter()
            .map(Record::key_label)
            .find(|key| state.contains(key));
        if let Some(key) = taken {
            return Err(duplicate(&key));
        }

        state.records.extend_from_slice(records);
        Ok(())
    }

    async fn find_all(&self) -> Result<RecordStream<'_>, Error> {
        let records = lock(&self.state).records.clone();
        Ok(futures::stream::iter(records.into_iter().map(Ok)).boxed())
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<Record>, Error> {
        Ok(lock(&self.state)
            .records
            .iter()
            .find(|r| r.key() == Some(key))
            .cloned())
    }

    async fn delete_by_key(&self, key: &str) -> Result<bool, Error> {
        let mut state = lock(&self.state);
        match state.records.iter().position(|r| r.key() == Some(key)) {
            Some(idx) => {
                state.records.remove(idx);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
