//! Filters
//!
//! A filter narrows (or, for dependent lookups, replaces) the record set of
//! a policy. Filters are built from their configuration by a factory; a
//! built filter has already passed validation.
//!
//! - [`value`] - field comparison against a literal
//! - [`age`] - age / time thresholds (`age`, `resource-time`)
//! - [`tag_count`] - number of user tags
//! - [`stream`] - LTS stream storage lookups
//! - [`vpcep`] - VPC endpoint coverage check

pub mod age;
pub mod stream;
pub mod tag_count;
pub mod value;
pub mod vpcep;

use crate::error::{Error, Result};
use crate::resource::{Record, ResourceType, RunContext};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A predicate (or record-transforming step) over a record set
#[async_trait]
pub trait Filter: Send + Sync + std::fmt::Debug {
    /// Registered type name
    fn kind(&self) -> &'static str;

    /// Whether one record passes.
    ///
    /// Record-transforming filters override [`Filter::process`] instead and
    /// leave this as the default.
    fn matches(&self, _record: &Record) -> Result<bool> {
        Ok(true)
    }

    /// Apply the filter to a whole record set
    async fn process(&self, records: Vec<Record>, _ctx: &RunContext<'_>) -> Result<Vec<Record>> {
        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            if self.matches(&record)? {
                kept.push(record);
            }
        }
        Ok(kept)
    }
}

/// Register the filters available on every resource type
pub fn register_common(resource: &mut ResourceType) {
    resource.register_filter("value", value::build);
    resource.register_filter("age", age::build_age);
    resource.register_filter("resource-time", age::build_resource_time);
    if resource.descriptor.taggable {
        resource.register_filter("tag-count", tag_count::build);
    }
}

/// Type name of a filter/action entry: a bare string or a mapping with `type`
pub fn config_type(config: &Value) -> Result<&str> {
    match config {
        Value::String(s) => Ok(s.as_str()),
        Value::Object(map) => map
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::config("entry has no 'type' key")),
        other => Err(Error::config(format!(
            "entry must be a string or a mapping, got {}",
            other
        ))),
    }
}

/// Deserialize the options of a filter/action entry (everything but `type`)
pub fn parse_options<T: DeserializeOwned>(kind: &str, config: &Value) -> Result<T> {
    let options = match config {
        Value::Object(map) => {
            let mut map = map.clone();
            map.remove("type");
            map
        },
        _ => Map::new(),
    };

    serde_json::from_value(Value::Object(options))
        .map_err(|e| Error::config(format!("invalid options for '{}': {}", kind, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Opts {
        #[serde(default)]
        count: Option<u32>,
    }

    #[test]
    fn test_config_type() {
        assert_eq!(config_type(&json!("delete")).unwrap(), "delete");
        assert_eq!(config_type(&json!({"type": "value", "key": "x"})).unwrap(), "value");
        assert!(config_type(&json!({"key": "x"})).unwrap_err().is_config());
        assert!(config_type(&json!(3)).unwrap_err().is_config());
    }

    #[test]
    fn test_parse_options_strips_type() {
        let opts: Opts = parse_options("tag-count", &json!({"type": "tag-count", "count": 3})).unwrap();
        assert_eq!(opts.count, Some(3));

        let opts: Opts = parse_options("tag-count", &json!("tag-count")).unwrap();
        assert_eq!(opts.count, None);
    }

    #[test]
    fn test_parse_options_rejects_unknown_keys() {
        let err = parse_options::<Opts>("tag-count", &json!({"type": "tag-count", "cnt": 3})).unwrap_err();
        assert!(err.to_string().contains("invalid options for 'tag-count'"));
    }
}
