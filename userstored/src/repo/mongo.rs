//! MongoDB backend, records are stored as BSON documents in the `users`
//! collection of the configured database.

use async_trait::async_trait;
use futures::StreamExt;
use log::debug;
use mongodb::{
    Client, Collection,
    bson::{self, Bson, Document, doc, oid::ObjectId},
    options::InsertManyOptions,
};
use serde_json::{Value, json};

use super::{Backend, Error, RecordStream};
use crate::{params, types::Record};

pub struct MongoBackend {
    collection: Collection<Document>,
}

impl MongoBackend {
    /// Opens a client on `settings.uri` and binds the `users` collection.
    ///
    /// The driver connects lazily, unreachable servers are reported by the
    /// first operation.
    pub async fn connect(settings: &params::MongoSettings) -> Result<Self, Error> {
        debug!(
            "opening mongodb client on database `{}`",
            settings.database
        );

        let client = Client::with_uri_str(&settings.uri).await?;
        let collection = client
            .database(&settings.database)
            .collection::<Document>(params::USERS_COLLECTION);

        Ok(Self { collection })
    }
}

#[async_trait]
impl Backend for MongoBackend {
    async fn insert_one(&self, record: &Record) -> Result<(), Error> {
        self.collection.insert_one(to_document(record)).await?;
        Ok(())
    }

    async fn insert_many(&self, records: &[Record]) -> Result<(), Error> {
        let documents: Vec<Document> = records.iter().map(to_document).collect();

        self.collection
            .insert_many(documents)
            .with_options(bulk_insert_options())
            .await?;
        Ok(())
    }

    async fn find_all(&self) -> Result<RecordStream<'_>, Error> {
        let cursor = self.collection.find(doc! {}).await?;

        Ok(cursor
            .map(|document| from_document(document?))
            .boxed())
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<Record>, Error> {
        self.collection
            .find_one(key_filter(key))
            .await?
            .map(from_document)
            .transpose()
    }

    async fn delete_by_key(&self, key: &str) -> Result<bool, Error> {
        let result = self
            .collection
            .delete_one(key_filter(key))
            .await?;

        Ok(result.deleted_count == 1)
    }
}

/// Extended JSON tags shared with the Data API
const DATE_TAG: &str = "$date";
const OBJECT_ID_TAG: &str = "$objectId";

/// Unordered, as on the Data API: a conflicting document does not stop the
/// rest of the batch.
fn bulk_insert_options() -> InsertManyOptions {
    InsertManyOptions::builder().ordered(false).build()
}

fn key_filter(key: &str) -> Document {
    let mut filter = Document::new();
    filter.insert(params::RECORD_KEY_FIELD, key);
    filter
}

fn to_document(record: &Record) -> Document {
    record
        .as_map()
        .iter()
        .map(|(field, value)| (field.clone(), json_to_bson(value)))
        .collect()
}

/// Converts a stored document to a record, documents written by other
/// clients may carry an `ObjectId` key which is turned into its hex form.
fn from_document(mut document: Document) -> Result<Record, Error> {
    let object_id = match document.get(params::RECORD_KEY_FIELD) {
        Some(Bson::ObjectId(oid)) => Some(oid.to_hex()),
        _ => None,
    };
    if let Some(hex) = object_id {
        document.insert(params::RECORD_KEY_FIELD, hex);
    }

    Ok(Record::try_from(bson_to_json(Bson::Document(document)))?)
}

/// BSON to JSON, dates become `{"$date": <epoch millis>}` and object ids
/// `{"$objectId": <hex>}`, the forms the Data API stores natively.
fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::DateTime(dt) => json!({ DATE_TAG: dt.timestamp_millis() }),
        Bson::ObjectId(oid) => json!({ OBJECT_ID_TAG: oid.to_hex() }),
        Bson::Document(document) => Value::Object(
            document
                .into_iter()
                .map(|(field, value)| (field, bson_to_json(value)))
                .collect(),
        ),
        Bson::Array(values) => Value::Array(values.into_iter().map(bson_to_json).collect()),
        other => other.into_relaxed_extjson(),
    }
}

fn json_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Bson::Int64(i),
            None => Bson::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(values) => Bson::Array(values.iter().map(json_to_bson).collect()),
        Value::Object(map) => {
            if let Some(tagged) = tagged_value(map) {
                return tagged;
            }
            Bson::Document(
                map.iter()
                    .map(|(field, value)| (field.clone(), json_to_bson(value)))
                    .collect(),
            )
        }
    }
}

/// Recognizes single-field `$date` and `$objectId` objects.
fn tagged_value(map: &serde_json::Map<String, Value>) -> Option<Bson> {
    if map.len() != 1 {
        return None;
    }

    if let Some(millis) = map.get(DATE_TAG).and_then(Value::as_i64) {
        return Some(Bson::DateTime(bson::DateTime::from_millis(millis)));
    }

    map.get(OBJECT_ID_TAG)
        .and_then(Value::as_str)
        .and_then(|hex| ObjectId::parse_str(hex).ok())
        .map(Bson::ObjectId)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_inserts_do_not_stop_at_conflicts() {
        assert_eq!(bulk_insert_options().ordered, Some(false));
    }

    #[test]
    fn object_id_keys_become_strings() {
        let oid = ObjectId::new();
        let record = from_document(doc! { "_id": oid, "name": "alice", "age": 31 }).unwrap();

        assert_eq!(record.key(), Some(oid.to_hex().as_str()));
        assert_eq!(record.get("name"), Some(&json!("alice")));
        assert_eq!(record.get("age"), Some(&json!(31)));
    }

    #[test]
    fn nested_fields_are_kept() {
        let record = Record::try_from(json!({
            "_id": "u-1",
            "address": { "city": "Turin", "zip": "10100" },
            "tags": ["a", "b"],
        }))
        .unwrap();

        let document = to_document(&record);
        assert_eq!(document.get_str("_id").unwrap(), "u-1");
        assert_eq!(
            document.get_document("address").unwrap().get_str("city").unwrap(),
            "Turin"
        );
        assert_eq!(from_document(document).unwrap(), record);
    }

    #[test]
    fn dates_and_object_ids_use_data_api_tags() {
        let manager = ObjectId::parse_str("65a1b2c3d4e5f60718293a4b").unwrap();
        let record = from_document(doc! {
            "_id": "u-1",
            "created_at": bson::DateTime::from_millis(1_700_000_000_000),
            "manager": manager,
            "history": [{ "at": bson::DateTime::from_millis(0) }],
        })
        .unwrap();

        assert_eq!(
            serde_json::Value::from(record),
            json!({
                "_id": "u-1",
                "created_at": { "$date": 1_700_000_000_000_i64 },
                "manager": { "$objectId": "65a1b2c3d4e5f60718293a4b" },
                "history": [{ "at": { "$date": 0 } }],
            })
        );
    }

    #[test]
    fn tagged_values_are_stored_as_bson_types() {
        let record = Record::try_from(json!({
            "_id": "u-1",
            "created_at": { "$date": 1_700_000_000_000_i64 },
            "manager": { "$objectId": "65a1b2c3d4e5f60718293a4b" },
            "note": { "$date": "not millis" },
            "score": 4.5,
        }))
        .unwrap();

        let document = to_document(&record);
        assert_eq!(
            document.get_datetime("created_at").unwrap().timestamp_millis(),
            1_700_000_000_000
        );
        assert_eq!(
            document.get_object_id("manager").unwrap().to_hex(),
            "65a1b2c3d4e5f60718293a4b"
        );
        assert_eq!(
            document.get_document("note").unwrap().get_str("$date").unwrap(),
            "not millis"
        );
        assert_eq!(document.get_f64("score").unwrap(), 4.5);
    }
}
