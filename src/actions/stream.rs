//! LTS log stream actions

use super::{per_record, Action, PerRecordAction};
use crate::error::Result;
use crate::filters::parse_options;
use crate::provider::ProviderRequest;
use crate::resource::{Record, ResourceDescriptor, ResourceType, RunContext};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// Retention applied when storage is turned down
pub const REDUCED_TTL_DAYS: u32 = 7;

pub fn register(resource: &mut ResourceType) {
    resource.register_action("disable-stream-storage", build_disable_storage);
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoOptions {}

/// `disable-stream-storage`: cuts each stream's retention to
/// [`REDUCED_TTL_DAYS`]
#[derive(Debug)]
pub struct DisableStreamStorage;

fn build_disable_storage(config: &Value, _descriptor: &ResourceDescriptor) -> Result<Box<dyn Action>> {
    parse_options::<NoOptions>("disable-stream-storage", config)?;
    Ok(per_record(DisableStreamStorage))
}

#[async_trait]
impl PerRecordAction for DisableStreamStorage {
    fn kind(&self) -> &'static str {
        "disable-stream-storage"
    }

    async fn perform(&self, record: &Record, ctx: &RunContext<'_>) -> Result<Option<Value>> {
        let group_id = record.require_str("log_group_id")?;
        let stream_id = record.require_str("log_stream_id")?;

        if !ctx.options.action_call_delay.is_zero() {
            tokio::time::sleep(ctx.options.action_call_delay).await;
        }

        let request = ProviderRequest::new("lts", "update_log_stream")
            .param("log_group_id", group_id)
            .param("log_stream_id", stream_id)
            .param("body", json!({"ttl_in_days": REDUCED_TTL_DAYS}));

        tracing::warn!("disabling storage of log stream {} in group {}", stream_id, group_id);
        let response = ctx.client.call(&request).await?;
        tracing::info!(
            "log stream {} updated (request_id={})",
            stream_id,
            super::response_ids(&response).0
        );
        Ok(Some(response))
    }
}
