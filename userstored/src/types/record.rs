use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{params, traits::KeyGenerator};

#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    #[error("record key must be a string or a number, found `{0}`")]
    InvalidKey(String),
    #[error("record must be a json object, found `{0}`")]
    NotAnObject(String),
}

/// A user record: an open-ended JSON object identified by a unique string
/// key stored under [`params::RECORD_KEY_FIELD`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        let mut record = Self::new();
        record.set_key(key);
        record
    }

    pub fn with_field(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_owned(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns the record key, if the record carries a string key.
    pub fn key(&self) -> Option<&str> {
        self.0.get(params::RECORD_KEY_FIELD).and_then(Value::as_str)
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        self.0
            .insert(params::RECORD_KEY_FIELD.to_owned(), Value::String(key.into()));
    }

    /// Key used when reporting about this record, `unknown` if no key is set.
    pub fn key_label(&self) -> String {
        match self.0.get(params::RECORD_KEY_FIELD) {
            Some(Value::String(key)) => key.clone(),
            Some(other) if !is_falsy(other) => other.to_string(),
            _ => "unknown".to_owned(),
        }
    }

    /// Guarantees the record carries a string key.
    ///
    /// A missing or falsy key (`null`, `""`, `0`, `false`, `[]`, `{}`) is
    /// replaced with a fresh key drawn from `keys`, a numeric key is turned
    /// into its decimal representation. Any other key is rejected.
    pub fn ensure_key(&mut self, keys: &dyn KeyGenerator) -> Result<&str, RecordError> {
        let normalized = match self.0.get(params::RECORD_KEY_FIELD) {
            None => keys.next_key(),
            Some(value) if is_falsy(value) => keys.next_key(),
            Some(Value::String(key)) => key.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => return Err(RecordError::InvalidKey(other.to_string())),
        };

        self.set_key(normalized);

        // the key has just been written as a string
        Ok(self.key().unwrap_or_default())
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Object(value.0)
    }
}

impl TryFrom<Value> for Record {
    type Error = RecordError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(RecordError::NotAnObject(other.to_string())),
        }
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fixed() -> String {
        "generated".to_owned()
    }

    #[test]
    fn missing_key_is_generated() {
        let mut record = Record::new().with_field("name", "alice");
        assert_eq!(record.ensure_key(&fixed).unwrap(), "generated");
        assert_eq!(record.get("name"), Some(&json!("alice")));
    }

    #[test]
    fn falsy_keys_are_replaced() {
        for falsy in [json!(null), json!(""), json!(0), json!(false), json!([]), json!({})] {
            let mut record = Record::try_from(json!({ "_id": falsy })).unwrap();
            assert_eq!(record.ensure_key(&fixed).unwrap(), "generated");
        }
    }

    #[test]
    fn existing_keys_are_kept_as_strings() {
        let mut record = Record::with_key("user-1");
        assert_eq!(record.ensure_key(&fixed).unwrap(), "user-1");

        let mut record = Record::try_from(json!({ "_id": 42 })).unwrap();
        assert_eq!(record.ensure_key(&fixed).unwrap(), "42");
        assert_eq!(record.get("_id"), Some(&json!("42")));
    }

    #[test]
    fn structured_keys_are_rejected() {
        let mut record = Record::try_from(json!({ "_id": { "a": 1 } })).unwrap();
        assert!(matches!(
            record.ensure_key(&fixed),
            Err(RecordError::InvalidKey(_))
        ));
    }

    #[test]
    fn non_objects_are_not_records() {
        assert!(matches!(
            Record::try_from(json!([1, 2])),
            Err(RecordError::NotAnObject(_))
        ));
    }

    #[test]
    fn key_label() {
        assert_eq!(Record::new().key_label(), "unknown");
        assert_eq!(Record::with_key("k").key_label(), "k");
    }
}
