//! Age filters
//!
//! `age` compares a record date against `now - (days + hours + minutes)`.
//! A record whose date is missing or unreadable simply does not match.
//!
//! `resource-time` is the strict variant used by policies that must not
//! silently skip records: the configured `time_attribute` has to be present
//! and parseable.

use super::{parse_options, Filter};
use crate::error::{Error, Result};
use crate::resource::{Record, ResourceDescriptor};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Field used when neither the config nor the descriptor names one
pub const DEFAULT_DATE_FIELD: &str = "created_at";

/// Largest epoch value still read as seconds (9999-12-31T23:59:59Z)
const MAX_EPOCH_SECONDS: i64 = 253_402_300_799;

/// Direction of an age comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeOp {
    /// Older than the threshold
    GreaterThan,
    /// Newer than the threshold
    LessThan,
}

impl AgeOp {
    fn parse(op: Option<&str>) -> Result<Self> {
        match op {
            None | Some("greater-than") | Some("gt") => Ok(Self::GreaterThan),
            Some("less-than") | Some("lt") => Ok(Self::LessThan),
            Some(other) => Err(Error::config(format!(
                "unknown age operator '{}' (expected greater-than or less-than)",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AgeOptions {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    op: Option<String>,
    #[serde(default)]
    days: f64,
    #[serde(default)]
    hours: f64,
    #[serde(default)]
    minutes: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResourceTimeOptions {
    #[serde(default)]
    time_attribute: Option<String>,
    #[serde(default)]
    op: Option<String>,
    #[serde(default)]
    days: f64,
    #[serde(default)]
    hours: f64,
    #[serde(default)]
    minutes: f64,
}

/// Age threshold filter
#[derive(Debug)]
pub struct AgeFilter {
    key: String,
    op: AgeOp,
    age: Duration,
    /// Missing/unparsable dates are errors instead of non-matches
    strict: bool,
}

pub(crate) fn build_age(config: &Value, descriptor: &ResourceDescriptor) -> Result<Box<dyn Filter>> {
    let options: AgeOptions = parse_options("age", config)?;
    let key = options
        .key
        .or_else(|| descriptor.date_field.clone())
        .unwrap_or_else(|| DEFAULT_DATE_FIELD.to_string());
    let age = duration_of(options.days, options.hours, options.minutes)?;
    Ok(Box::new(AgeFilter::new(&key, AgeOp::parse(options.op.as_deref())?, age)))
}

pub(crate) fn build_resource_time(config: &Value, _descriptor: &ResourceDescriptor) -> Result<Box<dyn Filter>> {
    let options: ResourceTimeOptions = parse_options("resource-time", config)?;
    let key = options
        .time_attribute
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| Error::config("resource-time needs a 'time_attribute'"))?;
    let age = duration_of(options.days, options.hours, options.minutes)?;
    Ok(Box::new(
        AgeFilter::new(&key, AgeOp::parse(options.op.as_deref())?, age).strict(),
    ))
}

fn duration_of(days: f64, hours: f64, minutes: f64) -> Result<Duration> {
    for (unit, amount) in [("days", days), ("hours", hours), ("minutes", minutes)] {
        if !amount.is_finite() || amount < 0.0 {
            return Err(Error::config(format!(
                "age '{}' must be a non-negative number, got {}",
                unit, amount
            )));
        }
    }
    let millis = ((days * 86_400.0 + hours * 3_600.0 + minutes * 60.0) * 1000.0).round();
    let age = if millis < i64::MAX as f64 {
        Duration::try_milliseconds(millis as i64)
    } else {
        None
    };
    match age {
        Some(age) if Local::now().checked_sub_signed(age).is_some() => Ok(age),
        _ => Err(Error::config(format!(
            "age of {} days, {} hours, {} minutes reaches past the earliest representable date",
            days, hours, minutes
        ))),
    }
}

impl AgeFilter {
    pub fn new(key: &str, op: AgeOp, age: Duration) -> Self {
        Self {
            key: key.to_string(),
            op,
            age,
            strict: false,
        }
    }

    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Threshold instant: local now minus the configured age, in UTC
    fn threshold(&self) -> Result<DateTime<Utc>> {
        Local::now()
            .checked_sub_signed(self.age)
            .map(|t| t.with_timezone(&Utc))
            .ok_or_else(|| Error::config(format!("age threshold for '{}' is out of range", self.key)))
    }

    /// Decide against an explicit threshold
    pub fn matches_at(&self, record: &Record, threshold: DateTime<Utc>) -> Result<bool> {
        let raw = match record.get_path(&self.key) {
            Some(Value::String(s)) if self.strict && s.trim().is_empty() => {
                return Err(Error::config(format!(
                    "record {} has a blank time attribute '{}'",
                    record.display_id(),
                    self.key
                )))
            },
            Some(v) if !v.is_null() => v,
            _ if self.strict => {
                return Err(Error::config(format!(
                    "record {} has no time attribute '{}'",
                    record.display_id(),
                    self.key
                )))
            },
            _ => return Ok(false),
        };

        let date = match parse_date(raw) {
            Some(date) => date,
            None if self.strict => {
                return Err(Error::data(format!(
                    "record {} has an unreadable '{}' value: {}",
                    record.display_id(),
                    self.key,
                    raw
                )))
            },
            None => {
                tracing::debug!(
                    "record {}: cannot read '{}' as a date, skipping",
                    record.display_id(),
                    self.key
                );
                return Ok(false);
            },
        };

        Ok(match self.op {
            AgeOp::GreaterThan => date < threshold,
            AgeOp::LessThan => date > threshold,
        })
    }
}

impl Filter for AgeFilter {
    fn kind(&self) -> &'static str {
        if self.strict {
            "resource-time"
        } else {
            "age"
        }
    }

    fn matches(&self, record: &Record) -> Result<bool> {
        self.matches_at(record, self.threshold()?)
    }
}

/// Read a date from the shapes provider APIs use
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(from_epoch),
        Value::String(s) => parse_date_str(s.trim()),
        _ => None,
    }
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value > MAX_EPOCH_SECONDS {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse::<i64>().ok().and_then(from_epoch);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // offsets without a colon, e.g. 2024-01-01T00:00:00.000+0800
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor() -> ResourceDescriptor {
        let mut d = ResourceDescriptor::new("alarm", "ces", "list_alarms", "metric_alarms", "alarm_id");
        d.date_field = Some("update_time".to_string());
        d
    }

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    fn days_ago(days: i64) -> String {
        (Utc::now() - Duration::days(days)).to_rfc3339()
    }

    #[test]
    fn test_older_than_threshold() {
        let f = build_age(&json!({"type": "age", "days": 30}), &descriptor()).unwrap();
        assert!(f.matches(&record(json!({"update_time": days_ago(40)}))).unwrap());
        assert!(!f.matches(&record(json!({"update_time": days_ago(10)}))).unwrap());
    }

    #[test]
    fn test_less_than_selects_newer() {
        let f = build_age(&json!({"type": "age", "days": 30, "op": "lt"}), &descriptor()).unwrap();
        assert!(f.matches(&record(json!({"update_time": days_ago(10)}))).unwrap());
        assert!(!f.matches(&record(json!({"update_time": days_ago(40)}))).unwrap());
    }

    #[test]
    fn test_key_defaults() {
        let f = build_age(&json!({"days": 1}), &descriptor()).unwrap();
        assert!(f.matches(&record(json!({"update_time": days_ago(2)}))).unwrap());

        let bare = ResourceDescriptor::new("x", "s", "list", "items", "id");
        let f = build_age(&json!({"days": 1}), &bare).unwrap();
        assert!(f.matches(&record(json!({"created_at": days_ago(2)}))).unwrap());
    }

    #[test]
    fn test_generic_age_degrades_on_bad_dates() {
        let f = build_age(&json!({"days": 1}), &descriptor()).unwrap();
        assert!(!f.matches(&record(json!({}))).unwrap());
        assert!(!f.matches(&record(json!({"update_time": "yesterday-ish"}))).unwrap());
    }

    #[test]
    fn test_resource_time_requires_attribute() {
        let f = build_resource_time(&json!({"time_attribute": "created", "days": 1}), &descriptor()).unwrap();
        assert!(f.matches(&record(json!({"id": "r1"}))).unwrap_err().is_config());
        assert!(matches!(
            f.matches(&record(json!({"id": "r1", "created": "not a date"}))),
            Err(Error::Data(_))
        ));
        assert!(f.matches(&record(json!({"created": days_ago(3)}))).unwrap());
    }

    #[test]
    fn test_resource_time_blank_attribute_is_missing() {
        let f = build_resource_time(&json!({"time_attribute": "created", "days": 1}), &descriptor()).unwrap();
        assert!(f.matches(&record(json!({"id": "r1", "created": ""}))).unwrap_err().is_config());
        assert!(f.matches(&record(json!({"id": "r1", "created": "  "}))).unwrap_err().is_config());
    }

    #[test]
    fn test_out_of_range_age_is_rejected() {
        for config in [
            json!({"days": 100_000_000}),
            json!({"hours": 1e300}),
            json!({"minutes": 1e18}),
        ] {
            let err = build_age(&config, &descriptor()).unwrap_err();
            assert!(err.is_config(), "{config}");
        }
        let err = build_resource_time(&json!({"time_attribute": "t", "days": 100_000_000}), &descriptor()).unwrap_err();
        assert!(err.is_config());

        let f = build_age(&json!({"days": 36_500}), &descriptor()).unwrap();
        assert!(!f.matches(&record(json!({"update_time": days_ago(10)}))).unwrap());
    }

    #[test]
    fn test_resource_time_config_needs_attribute() {
        let err = build_resource_time(&json!({"days": 1}), &descriptor()).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_negative_duration_rejected() {
        let err = build_age(&json!({"days": -1}), &descriptor()).unwrap_err();
        assert!(err.is_config());
        let err = build_age(&json!({"days": 1, "op": "older"}), &descriptor()).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_matches_at_fixed_threshold() {
        let f = AgeFilter::new("t", AgeOp::GreaterThan, Duration::zero());
        let threshold = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!(f.matches_at(&record(json!({"t": "2024-05-31"})), threshold).unwrap());
        assert!(!f.matches_at(&record(json!({"t": "2024-06-02 08:00:00"})), threshold).unwrap());
    }

    #[test]
    fn test_parse_date_shapes() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        for value in [
            json!("2024-01-02T03:04:05Z"),
            json!("2024-01-02T11:04:05+08:00"),
            json!("2024-01-02T11:04:05.000+0800"),
            json!("2024-01-02T03:04:05"),
            json!("2024-01-02 03:04:05"),
            json!(1704164645),
            json!(1704164645000i64),
            json!("1704164645"),
        ] {
            assert_eq!(parse_date(&value), Some(expected), "parsing {value}");
        }
        assert_eq!(
            parse_date(&json!("2024-01-02")),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_date(&json!("")), None);
        assert_eq!(parse_date(&json!(true)), None);
    }
}
