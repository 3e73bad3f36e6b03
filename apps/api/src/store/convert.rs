//! JSON <-> BSON bridge for the Mongo backend.
//!
//! Records travel as JSON through the API. In Mongo, `_id` values are stored
//! as real ObjectIds and membership timestamps as BSON dates so they index and
//! compare natively.

use bson::{oid::ObjectId, Bson, Document};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Number, Value};

use crate::models::farmer::MEMBERSHIPS_FIELD;
use crate::store::StoreError;

const DATE_FIELDS: &[&str] = &["mi_start", "mi_expiration", "mi_date_updated"];

/// Which record a document holds. Only a membership's own timestamps become
/// BSON dates; free-form fields elsewhere are stored as sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Farmer,
    Membership,
    Plain,
}

fn json_to_bson(key: Option<&str>, value: Value, layout: Layout) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Bson::Int64(i),
            None => Bson::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => string_to_bson(key, s, layout),
        Value::Array(items) => {
            let inner = match (layout, key) {
                (Layout::Farmer, Some(MEMBERSHIPS_FIELD)) => Layout::Membership,
                _ => Layout::Plain,
            };
            Bson::Array(
                items
                    .into_iter()
                    .map(|v| match v {
                        Value::Object(map) => Bson::Document(map_to_document(map, inner)),
                        other => json_to_bson(None, other, Layout::Plain),
                    })
                    .collect(),
            )
        }
        Value::Object(map) => Bson::Document(map_to_document(map, Layout::Plain)),
    }
}

fn string_to_bson(key: Option<&str>, s: String, layout: Layout) -> Bson {
    match key {
        Some("_id") => match ObjectId::parse_str(&s) {
            Ok(oid) => Bson::ObjectId(oid),
            Err(_) => Bson::String(s),
        },
        Some(k) if layout == Layout::Membership && DATE_FIELDS.contains(&k) => {
            match DateTime::parse_from_rfc3339(&s) {
                Ok(dt) => Bson::DateTime(bson::DateTime::from_chrono(dt.with_timezone(&Utc))),
                Err(_) => Bson::String(s),
            }
        }
        _ => Bson::String(s),
    }
}

fn map_to_document(map: Map<String, Value>, layout: Layout) -> Document {
    map.into_iter()
        .map(|(k, v)| {
            let b = json_to_bson(Some(&k), v, layout);
            (k, b)
        })
        .collect()
}

pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::Null => Value::Null,
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(i) => Value::from(i),
        Bson::Int64(i) => Value::from(i),
        Bson::Double(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        Bson::String(s) => Value::String(s),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => {
            Value::String(dt.to_chrono().to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::Document(doc) => Value::Object(
            doc.into_iter()
                .map(|(k, v)| (k, bson_to_json(v)))
                .collect(),
        ),
        other => other.into_relaxed_extjson(),
    }
}

/// Serializes a record into a Mongo document.
pub fn to_document<T: Serialize>(record: &T, layout: Layout) -> Result<Document, StoreError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => Ok(map_to_document(map, layout)),
        Ok(other) => Err(StoreError::Corrupt(format!(
            "expected an object, got {other}"
        ))),
        Err(e) => Err(StoreError::Corrupt(e.to_string())),
    }
}

/// Decodes a Mongo document back into a record.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    serde_json::from_value(bson_to_json(Bson::Document(doc)))
        .map_err(|e| StoreError::Corrupt(e.to_string()))
}

/// Builds a `$set` body, prefixing each patched key with `prefix`.
pub fn set_fields(patch: &Map<String, Value>, prefix: &str) -> Document {
    patch
        .iter()
        .map(|(k, v)| {
            let b = json_to_bson(Some(k), v.clone(), Layout::Plain);
            (format!("{prefix}{k}"), b)
        })
        .collect()
}
