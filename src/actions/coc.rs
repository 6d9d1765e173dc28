//! Patch compliance notifications

use super::smn::publish;
use super::{Action, ActionReport};
use crate::error::{Error, Result};
use crate::filters::parse_options;
use crate::resource::{Record, ResourceDescriptor, ResourceType, RunContext};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

pub fn register(resource: &mut ResourceType) {
    resource.register_action("non_compliant_alarm", build_non_compliant_alarm);
    resource.register_action("non-compliant-patch", build_non_compliant_alarm);
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AlarmOptions {
    #[serde(default)]
    smn: bool,
    #[serde(default)]
    region_id: Option<String>,
    #[serde(default)]
    topic_urn: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Where the summary goes when SMN is enabled
#[derive(Debug, Clone)]
struct Target {
    region_id: String,
    topic_urn: String,
    subject: String,
    message: String,
}

/// `non_compliant_alarm`: one SMN message summarising every
/// non-compliant instance
#[derive(Debug)]
pub struct NonCompliantAlarm {
    target: Option<Target>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn build_non_compliant_alarm(config: &Value, _descriptor: &ResourceDescriptor) -> Result<Box<dyn Action>> {
    let options: AlarmOptions = parse_options("non_compliant_alarm", config)?;
    let topic_urn = present(options.topic_urn);
    let message = present(options.message);

    // a destination and a message template only make sense together
    if topic_urn.is_some() != message.is_some() {
        return Err(Error::config(
            "non_compliant_alarm needs 'topic_urn' and 'message' together, or neither",
        ));
    }

    let target = if options.smn {
        match (present(options.region_id), topic_urn, present(options.subject), message) {
            (Some(region_id), Some(topic_urn), Some(subject), Some(message)) => Some(Target {
                region_id,
                topic_urn,
                subject,
                message,
            }),
            _ => {
                return Err(Error::config(
                    "non_compliant_alarm with smn enabled needs region_id, topic_urn, subject and message",
                ))
            },
        }
    } else {
        None
    };

    Ok(Box::new(NonCompliantAlarm { target }))
}

/// One summary line for a compliance record
pub fn summary_line(record: &Record) -> Result<String> {
    let count = record.require("non_compliant_summary.non_compliant_count")?;
    Ok(format!(
        "ecs_name: {}, ecs_instance_id: {}, region: {}, non_compliant_count: {};\n",
        record.text("name"),
        record.text("instance_id"),
        record.text("region"),
        count
    ))
}

#[async_trait]
impl Action for NonCompliantAlarm {
    fn kind(&self) -> &'static str {
        "non_compliant_alarm"
    }

    async fn process(&self, records: &[Record], ctx: &RunContext<'_>) -> Result<ActionReport> {
        let mut report = ActionReport::new(self.kind());

        let Some(target) = &self.target else {
            tracing::info!("non_compliant_alarm: smn disabled, nothing to send");
            return Ok(report);
        };

        let mut lines = String::new();
        let mut included = Vec::new();
        for record in records {
            match summary_line(record) {
                Ok(line) => {
                    lines.push_str(&line);
                    included.push(record.clone());
                },
                Err(e) => {
                    tracing::warn!("non_compliant_alarm: skipping {}: {}", record.display_id(), e);
                    report.failed(record, &e);
                },
            }
        }

        if included.is_empty() {
            tracing::info!("non_compliant_alarm: no non-compliant instances to report");
            return Ok(report);
        }

        let body = format!("{}\n{}", target.message, lines);
        match publish(
            ctx,
            &target.topic_urn,
            &target.subject,
            &body,
            Some(&target.region_id),
        )
        .await
        {
            Ok(response) => {
                report.succeeded_all(&included);
                report.responses.push(response);
            },
            Err(e) => {
                tracing::error!(
                    "non_compliant_alarm: publishing to {} failed: {}",
                    target.topic_urn,
                    e
                );
                report.failed_all(&included, &Error::Provider(e));
            },
        }

        Ok(report)
    }
}
