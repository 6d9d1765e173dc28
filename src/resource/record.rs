//! Resource records
//!
//! Provider schemas vary per resource type, so a record stays a dynamic
//! key/value map. Filters and actions read it through the typed accessors
//! below, which fail with [`Error::Data`] when a field is absent or has the
//! wrong type.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tag keys starting with this prefix are managed by the platform
pub const SYSTEM_TAG_PREFIX: &str = "_sys";

/// One enumerated provider object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap a JSON value; only objects are records
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::data(format!(
                "expected an object for a resource record, got {}",
                type_name(&other)
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look a value up by dot-notation path (`a.b.0.c`)
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.0.get(parts.next()?)?;

        for part in parts {
            // Handle array index
            current = match part.parse::<usize>() {
                Ok(idx) if current.is_array() => current.get(idx)?,
                _ => current.get(part)?,
            };
        }

        Some(current)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Normalized record id
    pub fn id(&self) -> Option<String> {
        self.get("id").and_then(scalar_to_string)
    }

    /// Id for log lines: the id, or `-` when there is none
    pub fn display_id(&self) -> String {
        self.id().unwrap_or_else(|| "-".to_string())
    }

    /// Required field of any type
    pub fn require(&self, key: &str) -> Result<&Value> {
        match self.get_path(key) {
            Some(Value::Null) | None => Err(Error::data(format!(
                "record {} has no '{}' field",
                self.display_id(),
                key
            ))),
            Some(v) => Ok(v),
        }
    }

    /// Required string field
    pub fn require_str(&self, key: &str) -> Result<&str> {
        let value = self.require(key)?;
        value.as_str().ok_or_else(|| {
            Error::data(format!(
                "record {} field '{}' should be a string, got {}",
                self.display_id(),
                key,
                type_name(value)
            ))
        })
    }

    /// Required integer field
    pub fn require_i64(&self, key: &str) -> Result<i64> {
        let value = self.require(key)?;
        value.as_i64().ok_or_else(|| {
            Error::data(format!(
                "record {} field '{}' should be an integer, got {}",
                self.display_id(),
                key,
                type_name(value)
            ))
        })
    }

    /// Field rendered for a human-readable message
    pub fn text(&self, path: &str) -> String {
        match self.get_path(path) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(Value::Null) | None => "-".to_string(),
            Some(Value::Array(arr)) => format!("[{} items]", arr.len()),
            Some(Value::Object(_)) => "[object]".to_string(),
        }
    }

    /// Keys of the record's tag collection.
    ///
    /// Tags come either as a `{key: value}` object or as a
    /// `[{"key": .., "value": ..}]` list.
    pub fn tag_keys(&self) -> Vec<&str> {
        match self.get("tags") {
            Some(Value::Object(map)) => map.keys().map(|k| k.as_str()).collect(),
            Some(Value::Array(list)) => list
                .iter()
                .filter_map(|t| t.get("key").and_then(|k| k.as_str()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Number of user tags (system-prefixed keys excluded)
    pub fn user_tag_count(&self) -> usize {
        self.tag_keys()
            .into_iter()
            .filter(|k| !k.starts_with(SYSTEM_TAG_PREFIX))
            .count()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Render ids, which some services return as numbers
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
