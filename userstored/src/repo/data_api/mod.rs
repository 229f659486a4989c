//! # Data API Backend
//!
//! Backend for the Cassandra based services (HCD and Astra DB) exposing the
//! DataStax Data API, a document interface served as JSON commands over HTTP.
//!
//! Setup makes sure both the keyspace and the `users` collection exist before
//! the handle is returned. Only "already exists" answers are tolerated during
//! setup, any other failure aborts it.

mod admin;
mod client;
pub mod token;

pub use client::{ApiFlavor, DataApiClient, check_response};

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use log::{debug, warn};
use serde_json::{Value, json};

use super::{Backend, Error, RecordStream};
use crate::{params, types::Record};

pub struct DataApiBackend {
    client: DataApiClient,
    keyspace: String,
}

impl DataApiBackend {
    pub async fn connect_hcd(settings: &params::HcdSettings) -> Result<Self, Error> {
        let token = token::username_password(&settings.username, &settings.password);
        let client = DataApiClient::new(&settings.api_endpoint, ApiFlavor::Hcd, token)?;

        tolerate_existing(admin::create_keyspace(&client, &settings.keyspace).await)?;

        Self::bind(client, &settings.keyspace).await
    }

    pub async fn connect_astra(settings: &params::AstraSettings) -> Result<Self, Error> {
        let client = DataApiClient::new(
            &settings.api_endpoint(),
            ApiFlavor::Astra,
            settings.token.clone(),
        )?;

        let admin = admin::AstraAdmin::new(&settings.db_id, &settings.token);

        Self::setup_astra(client, &admin, &settings.keyspace).await
    }

    /// Creates the keyspace through the DevOps API when the database does not
    /// list it, then waits for the database to come back from maintenance.
    async fn setup_astra(
        client: DataApiClient,
        admin: &admin::AstraAdmin,
        keyspace: &str,
    ) -> Result<Self, Error> {
        let keyspaces = admin::list_keyspaces(&client).await?;
        if !keyspaces.iter().any(|k| k == keyspace) {
            tolerate_existing(admin.create_keyspace(keyspace).await)?;
            admin.wait_until_active().await?;
        }

        Self::bind(client, keyspace).await
    }

    async fn bind(client: DataApiClient, keyspace: &str) -> Result<Self, Error> {
        let backend = Self {
            client,
            keyspace: keyspace.to_owned(),
        };
        backend.ensure_collection().await?;
        Ok(backend)
    }

    /// Creates the `users` collection, falling back to the existing one.
    ///
    /// A creation failure other than "already exists" is only tolerated when
    /// the collection turns out to be listed in the keyspace.
    async fn ensure_collection(&self) -> Result<(), Error> {
        let created = self
            .client
            .command(
                &[self.keyspace.as_str()],
                json!({ "createCollection": { "name": params::USERS_COLLECTION } }),
            )
            .await;

        match created {
            Ok(_) => {
                debug!(
                    "collection `{}.{}` ready",
                    self.keyspace,
                    params::USERS_COLLECTION
                );
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                debug!(
                    "collection `{}.{}` already exists",
                    self.keyspace,
                    params::USERS_COLLECTION
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    "unable to create collection `{}`: {}, looking for an existing one",
                    params::USERS_COLLECTION,
                    e
                );
                let collections = admin::list_collections(&self.client, &self.keyspace).await?;
                if collections.iter().any(|c| c == params::USERS_COLLECTION) {
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn collection_command(&self, command: Value) -> Result<Value, Error> {
        self.client
            .command(&[self.keyspace.as_str(), params::USERS_COLLECTION], command)
            .await
    }

    async fn find_page(&self, page_state: Option<String>) -> Result<Page, Error> {
        let mut options = json!({});
        if let Some(page_state) = page_state {
            options["pageState"] = Value::String(page_state);
        }

        let body = self
            .collection_command(json!({ "find": { "filter": {}, "options": options } }))
            .await?;
        Page::try_from(body)
    }
}

#[async_trait]
impl Backend for DataApiBackend {
    async fn insert_one(&self, record: &Record) -> Result<(), Error> {
        self.collection_command(json!({ "insertOne": { "document": record } }))
            .await?;
        Ok(())
    }

    async fn insert_many(&self, records: &[Record]) -> Result<(), Error> {
        self.collection_command(json!({
            "insertMany": {
                "documents": records,
                "options": { "ordered": false }
            }
        }))
        .await?;
        Ok(())
    }

    async fn find_all(&self) -> Result<RecordStream<'_>, Error> {
        // first page is eager, an unreachable collection fails the call itself
        let first = self.find_page(None).await?;

        let pages = stream::try_unfold(Some(first), move |page| async move {
            let Some(page) = page else {
                return Ok(None);
            };
            let next = match page.next_page_state {
                Some(state) => Some(self.find_page(Some(state)).await?),
                None => None,
            };
            let records = stream::iter(page.documents.into_iter().map(Ok::<_, Error>));
            Ok::<_, Error>(Some((records, next)))
        });

        Ok(pages.try_flatten().boxed())
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<Record>, Error> {
        let body = self
            .collection_command(json!({
                "findOne": { "filter": key_filter(key) }
            }))
            .await?;

        match body.get("data").and_then(|data| data.get("document")) {
            None | Some(Value::Null) => Ok(None),
            Some(document) => Ok(Some(Record::try_from(document.clone())?)),
        }
    }

    async fn delete_by_key(&self, key: &str) -> Result<bool, Error> {
        let body = self
            .collection_command(json!({
                "deleteOne": { "filter": key_filter(key) }
            }))
            .await?;

        let deleted = body
            .get("status")
            .and_then(|status| status.get("deletedCount"))
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::UnexpectedResponse("missing `status.deletedCount`".into()))?;

        Ok(deleted == 1)
    }
}

/// One page of a `find` command.
#[derive(Debug)]
struct Page {
    documents: Vec<Record>,
    next_page_state: Option<String>,
}

impl TryFrom<Value> for Page {
    type Error = Error;

    fn try_from(mut body: Value) -> Result<Self, Self::Error> {
        let data = body
            .get_mut("data")
            .map(Value::take)
            .ok_or_else(|| Error::UnexpectedResponse("missing `data`".into()))?;

        let documents = match data.get("documents") {
            Some(Value::Array(documents)) => documents
                .iter()
                .cloned()
                .map(Record::try_from)
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(Error::UnexpectedResponse("missing `data.documents`".into())),
        };

        let next_page_state = data
            .get("nextPageState")
            .and_then(Value::as_str)
            .map(str::to_owned);

        Ok(Self {
            documents,
            next_page_state,
        })
    }
}

fn key_filter(key: &str) -> Value {
    let mut filter = serde_json::Map::new();
    filter.insert(params::RECORD_KEY_FIELD.to_owned(), Value::from(key));
    Value::Object(filter)
}

fn tolerate_existing(result: Result<(), Error>) -> Result<(), Error> {
    match result {
        Err(e) if e.is_already_exists() => {
            debug!("{}, reusing it", e);
            Ok(())
        }
        other => other,
    }
}
