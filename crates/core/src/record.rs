// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Records and change events.
//!
//! A [`Record`] is an opaque document with a stable `id`. Records carry no
//! version counter: among conflicting updates the last one received wins.
//! A [`ChangeEvent`] is a single create/update/delete notification carrying
//! a full record payload (deletes may carry only the `id`).

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A document in a collection.
///
/// Serialized flat: `{"id": "a1", "collection": "notes", "title": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable identifier, unique within the collection.
    pub id: String,
    /// Owning collection name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub collection: String,
    /// All remaining fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Creates a record with no fields.
    pub fn new(id: impl Into<String>, collection: impl Into<String>) -> Self {
        Record {
            id: id.into(),
            collection: collection.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Sets a field, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    /// Looks up a field by dotted path (`author.name`).
    ///
    /// `id` and `collection` resolve to the record's own identifiers.
    pub fn lookup(&self, path: &str) -> Option<Cow<'_, Value>> {
        match path {
            "id" => return Some(Cow::Owned(Value::String(self.id.clone()))),
            "collection" => return Some(Cow::Owned(Value::String(self.collection.clone()))),
            _ => {}
        }

        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.fields.get(first)?;
        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(Cow::Borrowed(current))
    }

    /// Decodes a record from an untyped JSON payload.
    ///
    /// The payload must be an object with a non-empty string `id`. A missing
    /// `collection` is filled in from `collection`; a different one is an
    /// error.
    pub fn from_value(payload: Value, collection: &str) -> Result<Self> {
        let mut fields = match payload {
            Value::Object(map) => map,
            other => {
                return Err(Error::MalformedRecord(format!(
                    "expected object, got {}",
                    json_type_name(&other)
                )))
            }
        };

        let id = match fields.remove("id") {
            Some(Value::String(id)) if !id.is_empty() => id,
            Some(Value::String(_)) => {
                return Err(Error::MalformedRecord("empty id".to_string()));
            }
            Some(other) => {
                return Err(Error::MalformedRecord(format!(
                    "id must be a string, got {}",
                    json_type_name(&other)
                )))
            }
            None => return Err(Error::MalformedRecord("missing id".to_string())),
        };

        let found = match fields.remove("collection") {
            Some(Value::String(name)) if !name.is_empty() => Some(name),
            Some(Value::String(_)) | Some(Value::Null) | None => None,
            Some(other) => {
                return Err(Error::MalformedRecord(format!(
                    "collection must be a string, got {}",
                    json_type_name(&other)
                )))
            }
        };

        if let Some(found) = &found {
            if found != collection {
                return Err(Error::CollectionMismatch {
                    expected: collection.to_string(),
                    found: found.clone(),
                });
            }
        }

        Ok(Record {
            id,
            collection: collection.to_string(),
            fields,
        })
    }

    /// Converts the record into a flat JSON object.
    pub fn into_value(self) -> Value {
        let mut map = Map::with_capacity(self.fields.len() + 2);
        map.insert("id".to_string(), Value::String(self.id));
        if !self.collection.is_empty() {
            map.insert("collection".to_string(), Value::String(self.collection));
        }
        map.extend(self.fields);
        Value::Object(map)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The kind of change a [`ChangeEvent`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(ChangeKind::Create),
            "update" => Ok(ChangeKind::Update),
            "delete" => Ok(ChangeKind::Delete),
            _ => Err(Error::InvalidAction(s.to_string())),
        }
    }
}

/// A single change notification for one record.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub record: Record,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, record: Record) -> Self {
        ChangeEvent { kind, record }
    }

    /// Creates a Create event.
    pub fn create(record: Record) -> Self {
        Self::new(ChangeKind::Create, record)
    }

    /// Creates an Update event.
    pub fn update(record: Record) -> Self {
        Self::new(ChangeKind::Update, record)
    }

    /// Creates a Delete event carrying only the record id.
    pub fn delete(id: impl Into<String>, collection: impl Into<String>) -> Self {
        Self::new(ChangeKind::Delete, Record::new(id, collection))
    }

    /// Decodes a change notification from its wire parts.
    pub fn decode(action: &str, payload: Value, collection: &str) -> Result<Self> {
        let kind = action.parse::<ChangeKind>()?;
        let record = Record::from_value(payload, collection)?;
        Ok(ChangeEvent { kind, record })
    }

    /// The id of the affected record.
    pub fn id(&self) -> &str {
        &self.record.id
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
