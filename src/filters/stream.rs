//! LTS stream storage filters
//!
//! Both run against log groups. The scheduled variant fans out to every
//! group's streams and replaces the record set with the streams that still
//! have log storage enabled.

use super::{parse_options, Filter};
use crate::error::Result;
use crate::resource::{ChildListing, Record, ResourceDescriptor, ResourceType, RunContext};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// Log groups created by FunctionGraph are managed elsewhere
pub const FUNCTIONGRAPH_GROUP_PREFIX: &str = "functiongraph.log.group";

pub fn register(resource: &mut ResourceType) {
    resource.register_filter("streams-storage-enabled", build_pass_through);
    resource.register_filter("streams-storage-enabled-for-schedule", build_for_schedule);
}

/// Event-mode variant: the triggering records are already the candidates
#[derive(Debug)]
pub struct StreamsStorageEnabled;

fn build_pass_through(config: &Value, _descriptor: &ResourceDescriptor) -> Result<Box<dyn Filter>> {
    parse_options::<NoOptions>("streams-storage-enabled", config)?;
    Ok(Box::new(StreamsStorageEnabled))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoOptions {}

#[async_trait]
impl Filter for StreamsStorageEnabled {
    fn kind(&self) -> &'static str {
        "streams-storage-enabled"
    }

    async fn process(&self, records: Vec<Record>, _ctx: &RunContext<'_>) -> Result<Vec<Record>> {
        tracing::info!("streams-storage-enabled: {} record(s) in total", records.len());
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScheduleOptions {
    #[serde(default = "default_exclude_prefix")]
    exclude_prefix: String,
}

fn default_exclude_prefix() -> String {
    FUNCTIONGRAPH_GROUP_PREFIX.to_string()
}

/// Scheduled variant: log groups in, storage-enabled log streams out
#[derive(Debug)]
pub struct StreamsStorageEnabledForSchedule {
    exclude_prefix: String,
}

fn build_for_schedule(config: &Value, _descriptor: &ResourceDescriptor) -> Result<Box<dyn Filter>> {
    let options: ScheduleOptions = parse_options("streams-storage-enabled-for-schedule", config)?;
    Ok(Box::new(StreamsStorageEnabledForSchedule {
        exclude_prefix: options.exclude_prefix,
    }))
}

impl StreamsStorageEnabledForSchedule {
    fn listing(&self, ctx: &RunContext<'_>) -> ChildListing {
        let listing = ChildListing::new("lts", "list_log_stream", "log_group_id", "log_streams")
            .with_delay(ctx.options.secondary_call_delay);
        if self.exclude_prefix.is_empty() {
            listing
        } else {
            listing.excluding("log_group_name", &self.exclude_prefix)
        }
    }
}

#[async_trait]
impl Filter for StreamsStorageEnabledForSchedule {
    fn kind(&self) -> &'static str {
        "streams-storage-enabled-for-schedule"
    }

    async fn process(&self, records: Vec<Record>, ctx: &RunContext<'_>) -> Result<Vec<Record>> {
        let groups = self.listing(ctx).list(&records, ctx.client).await?;

        let mut streams = Vec::new();
        for (group, children) in groups {
            let group_id = group.require_str("log_group_id")?;
            for stream in children {
                let enabled = stream
                    .get("whether_log_storage")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                if !enabled {
                    continue;
                }

                let stream_id = stream.require_str("log_stream_id")?;
                let record = Record::from_value(json!({
                    "log_group_id": group_id,
                    "log_stream_id": stream_id,
                    "log_stream_name": stream.get("log_stream_name").cloned().unwrap_or(Value::Null),
                    "id": stream_id,
                    "tags": stream.get("tag").cloned().unwrap_or(Value::Null),
                }))?;
                streams.push(record);
            }
        }

        tracing::info!(
            "streams-storage-enabled-for-schedule: {} stream(s) with storage enabled",
            streams.len()
        );
        Ok(streams)
    }
}
