//! VPC endpoint check notifications

use super::smn::publish;
use super::{per_record, Action, PerRecordAction};
use crate::error::{Error, Result};
use crate::filters::parse_options;
use crate::resource::{Record, ResourceDescriptor, ResourceType, RunContext};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_MESSAGE: &str = "Notification: VPC Endpoint Configuration Check";
const SUBJECT: &str = "VPC Endpoint Configuration Notification";

pub fn register(resource: &mut ResourceType) {
    resource.register_action("eps-check-ep-msg", build_check_message);
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CheckMessageOptions {
    topic_urn_list: Vec<String>,
    #[serde(default)]
    message: Option<String>,
}

/// `eps-check-ep-msg`: tells every topic which VPCs lack an endpoint to the
/// checked service
#[derive(Debug)]
pub struct CheckMessage {
    topics: Vec<String>,
    message: String,
}

fn build_check_message(config: &Value, _descriptor: &ResourceDescriptor) -> Result<Box<dyn Action>> {
    let options: CheckMessageOptions = parse_options("eps-check-ep-msg", config)?;
    if options.topic_urn_list.is_empty() {
        return Err(Error::config("eps-check-ep-msg needs at least one topic in 'topic_urn_list'"));
    }

    Ok(per_record(CheckMessage {
        topics: options.topic_urn_list,
        message: options.message.unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
    }))
}

impl CheckMessage {
    pub fn render(&self, record: &Record) -> String {
        let service = record
            .get("endpoint_service_name")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let vpc_ids: Vec<&str> = record
            .get("vpc_ids")
            .and_then(|v| v.as_array())
            .map(|ids| ids.iter().filter_map(|id| id.as_str()).collect())
            .unwrap_or_default();

        if vpc_ids.is_empty() {
            format!(
                "{} Please check whether VPC has a VPC endpoint configured, \
                 and whether the endpoint service name is {}.",
                self.message, service
            )
        } else {
            format!(
                "{} Please check whether VPC ({}) has VPC endpoints configured, \
                 and whether the endpoint service name is {}.",
                self.message,
                vpc_ids.join(", "),
                service
            )
        }
    }
}

#[async_trait]
impl PerRecordAction for CheckMessage {
    fn kind(&self) -> &'static str {
        "eps-check-ep-msg"
    }

    async fn perform(&self, record: &Record, ctx: &RunContext<'_>) -> Result<Option<Value>> {
        let message = self.render(record);
        let mut results = Vec::with_capacity(self.topics.len());
        let mut first_error = None;

        // every topic is attempted even when an earlier one fails
        for topic in &self.topics {
            match publish(ctx, topic, SUBJECT, &message, None).await {
                Ok(response) => results.push(json!({
                    "status": "success",
                    "topic_urn": topic,
                    "message_id": response.get("message_id").cloned().unwrap_or(Value::Null),
                })),
                Err(e) => {
                    tracing::error!("eps-check-ep-msg: publishing to {} failed: {}", topic, e);
                    results.push(json!({
                        "status": "error",
                        "topic_urn": topic,
                        "error": e.to_string(),
                    }));
                    first_error.get_or_insert(e);
                },
            }
        }

        match first_error {
            Some(e) => Err(Error::Provider(e)),
            None => Ok(Some(Value::Array(results))),
        }
    }
}
