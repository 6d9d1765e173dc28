//! Value filter
//!
//! Compares the value at a dotted key path against a literal.

use super::{parse_options, Filter};
use crate::error::{Error, Result};
use crate::resource::{Record, ResourceDescriptor, ResourceType};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::str::FromStr;

/// Comparison operators shared by the value and tag-count filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    Regex,
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "eq" | "equal" => Self::Eq,
            "ne" | "not-equal" => Self::Ne,
            "gt" | "greater-than" => Self::Gt,
            "gte" | "ge" => Self::Gte,
            "lt" | "less-than" => Self::Lt,
            "lte" | "le" => Self::Lte,
            "in" => Self::In,
            "ni" | "not-in" => Self::NotIn,
            "contains" => Self::Contains,
            "regex" => Self::Regex,
            other => return Err(Error::config(format!("unknown operator '{}'", other))),
        })
    }
}

impl Operator {
    /// Whether this is one of the six ordering/equality comparisons
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Gt | Self::Gte | Self::Lt | Self::Lte
        )
    }

    /// Apply a comparison operator to an ordering of `actual` vs `expected`
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Gte => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Lte => ordering != Ordering::Greater,
            Self::In | Self::NotIn | Self::Contains | Self::Regex => false,
        }
    }
}

/// Equality with numeric normalisation (`1 == 1.0`)
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering between two values of the same kind; `None` when incomparable
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ValueOptions {
    key: String,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    op: Option<String>,
}

/// What the field is checked against
#[derive(Debug, Clone)]
enum Expected {
    Absent,
    Present,
    Empty,
    NotNull,
    Literal(Value),
}

/// Field comparison filter
#[derive(Debug)]
pub struct ValueFilter {
    key: String,
    expected: Expected,
    op: Operator,
    regex: Option<Regex>,
}

pub(crate) fn build(config: &Value, _descriptor: &ResourceDescriptor) -> Result<Box<dyn Filter>> {
    Ok(Box::new(ValueFilter::from_config(config)?))
}

/// Expose the value filter under another type name
pub fn register_alias(resource: &mut ResourceType, alias: &str) {
    resource.register_filter(alias, build);
}

impl ValueFilter {
    pub fn from_config(config: &Value) -> Result<Self> {
        let options: ValueOptions = parse_options("value", config)?;
        let op = match options.op.as_deref() {
            Some(op) => op.parse()?,
            None => Operator::Eq,
        };
        Self::new(&options.key, options.value.unwrap_or(Value::Null), op)
    }

    pub fn new(key: &str, value: Value, op: Operator) -> Result<Self> {
        if key.trim().is_empty() {
            return Err(Error::config("value filter needs a non-empty 'key'"));
        }

        let expected = match value.as_str() {
            Some("absent") => Expected::Absent,
            Some("present") => Expected::Present,
            Some("empty") => Expected::Empty,
            Some("not-null") => Expected::NotNull,
            _ if value.is_null() => {
                return Err(Error::config(format!(
                    "value filter on '{}' needs a 'value'",
                    key
                )))
            },
            _ => Expected::Literal(value),
        };

        let mut regex = None;
        if let Expected::Literal(literal) = &expected {
            match op {
                Operator::In | Operator::NotIn if !literal.is_array() => {
                    return Err(Error::config(format!(
                        "operator '{:?}' on '{}' needs a list value",
                        op, key
                    )));
                },
                Operator::Regex => {
                    let pattern = literal.as_str().ok_or_else(|| {
                        Error::config(format!("regex on '{}' must be a string", key))
                    })?;
                    // anchored at the start, like a prefix match
                    let compiled = Regex::new(&format!("^(?:{})", pattern)).map_err(|e| {
                        Error::config(format!("invalid regex '{}': {}", pattern, e))
                    })?;
                    regex = Some(compiled);
                },
                _ => {},
            }
        }

        Ok(Self {
            key: key.to_string(),
            expected,
            op,
            regex,
        })
    }

    fn compare(&self, actual: &Value, expected: &Value) -> bool {
        match self.op {
            Operator::In => expected
                .as_array()
                .map(|list| list.iter().any(|e| values_equal(actual, e)))
                .unwrap_or(false),
            Operator::NotIn => expected
                .as_array()
                .map(|list| !list.iter().any(|e| values_equal(actual, e)))
                .unwrap_or(false),
            Operator::Contains => match (actual, expected) {
                (Value::Array(items), _) => items.iter().any(|i| values_equal(i, expected)),
                (Value::String(s), Value::String(needle)) => s.contains(needle.as_str()),
                _ => false,
            },
            Operator::Regex => {
                let text = match actual {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return false,
                };
                self.regex.as_ref().map(|r| r.is_match(&text)).unwrap_or(false)
            },
            Operator::Eq => values_equal(actual, expected),
            Operator::Ne => !values_equal(actual, expected),
            op => compare_values(actual, expected)
                .map(|ord| op.holds(ord))
                .unwrap_or(false),
        }
    }
}

impl Filter for ValueFilter {
    fn kind(&self) -> &'static str {
        "value"
    }

    fn matches(&self, record: &Record) -> Result<bool> {
        let actual = record.get_path(&self.key);

        Ok(match &self.expected {
            Expected::Absent => matches!(actual, None | Some(Value::Null)),
            Expected::Present => !matches!(actual, None | Some(Value::Null)),
            Expected::NotNull => matches!(actual, Some(v) if !v.is_null()),
            Expected::Empty => match actual {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(Value::Array(a)) => a.is_empty(),
                Some(Value::Object(o)) => o.is_empty(),
                Some(_) => false,
            },
            Expected::Literal(expected) => match actual {
                None | Some(Value::Null) => false,
                Some(actual) => self.compare(actual, expected),
            },
        })
    }
}
