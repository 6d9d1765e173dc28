//! Cloud Eye alarm rule actions

use super::{per_record, Action, PerRecordAction};
use crate::error::Result;
use crate::filters::parse_options;
use crate::provider::ProviderRequest;
use crate::resource::{Record, ResourceDescriptor, ResourceType, RunContext};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

pub fn register(resource: &mut ResourceType) {
    resource.register_action("delete", build_delete);
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoOptions {}

/// `delete`: removes each alarm rule
#[derive(Debug)]
pub struct DeleteAlarm;

fn build_delete(config: &Value, _descriptor: &ResourceDescriptor) -> Result<Box<dyn Action>> {
    parse_options::<NoOptions>("delete", config)?;
    Ok(per_record(DeleteAlarm))
}

#[async_trait]
impl PerRecordAction for DeleteAlarm {
    fn kind(&self) -> &'static str {
        "delete"
    }

    async fn perform(&self, record: &Record, ctx: &RunContext<'_>) -> Result<Option<Value>> {
        let alarm_id = record.require_str("alarm_id")?;
        let request = ProviderRequest::new("ces", "delete_alarm").param("alarm_id", alarm_id);

        let response = ctx.client.call(&request).await?;
        tracing::info!(
            "deleted alarm {} (request_id={})",
            alarm_id,
            super::response_ids(&response).0
        );
        Ok(Some(response))
    }
}
