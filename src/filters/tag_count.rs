//! Tag count filter

use super::value::Operator;
use super::{parse_options, Filter};
use crate::error::{Error, Result};
use crate::resource::{Record, ResourceDescriptor};
use serde::Deserialize;
use serde_json::Value;

const DEFAULT_COUNT: usize = 5;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TagCountOptions {
    #[serde(default)]
    count: Option<usize>,
    #[serde(default)]
    op: Option<String>,
}

/// Compares the number of user tags (`_sys*` keys excluded) with `count`
#[derive(Debug)]
pub struct TagCountFilter {
    count: usize,
    op: Operator,
}

pub(crate) fn build(config: &Value, _descriptor: &ResourceDescriptor) -> Result<Box<dyn Filter>> {
    let options: TagCountOptions = parse_options("tag-count", config)?;
    let op = match options.op.as_deref() {
        Some(op) => op.parse()?,
        None => Operator::Gte,
    };
    Ok(Box::new(TagCountFilter::new(options.count.unwrap_or(DEFAULT_COUNT), op)?))
}

impl TagCountFilter {
    pub fn new(count: usize, op: Operator) -> Result<Self> {
        if !op.is_comparison() {
            return Err(Error::config(format!(
                "tag-count supports eq, ne, gt, gte, lt and lte, not {:?}",
                op
            )));
        }
        Ok(Self { count, op })
    }
}

impl Filter for TagCountFilter {
    fn kind(&self) -> &'static str {
        "tag-count"
    }

    fn matches(&self, record: &Record) -> Result<bool> {
        Ok(self.op.holds(record.user_tag_count().cmp(&self.count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor::new("alarm", "ces", "list_alarms", "metric_alarms", "alarm_id").taggable()
    }

    #[test]
    fn test_system_tags_ignored() {
        let f = build(&json!({"type": "tag-count", "count": 2}), &descriptor()).unwrap();
        let r = Record::from_value(json!({"tags": {"a": 1, "b": 2, "_sys_c": 3}})).unwrap();
        assert!(f.matches(&r).unwrap());

        let f = build(&json!({"count": 3}), &descriptor()).unwrap();
        assert!(!f.matches(&r).unwrap());
    }

    #[test]
    fn test_defaults_to_five_or_more() {
        let f = build(&json!("tag-count"), &descriptor()).unwrap();
        let tags: serde_json::Map<_, _> = (0..5).map(|i| (format!("k{i}"), json!("v"))).collect();
        let r = Record::from_value(json!({ "tags": tags })).unwrap();
        assert!(f.matches(&r).unwrap());
        assert!(!f.matches(&Record::new()).unwrap());
    }

    #[test]
    fn test_eq_zero_matches_untagged() {
        let f = build(&json!({"count": 0, "op": "eq"}), &descriptor()).unwrap();
        assert!(f.matches(&Record::from_value(json!({"tags": []})).unwrap()).unwrap());
    }

    #[test]
    fn test_rejects_non_comparison_operator() {
        let err = build(&json!({"count": 1, "op": "regex"}), &descriptor()).unwrap_err();
        assert!(err.is_config());
    }
}
