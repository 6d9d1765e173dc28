//! Simple Message Notification
//!
//! [`publish`] is the one place that talks to SMN; the notification actions
//! of every resource type go through it.
//!
//! The three `notify-*` actions differ only in the body they send: a plain
//! message, a per-protocol message structure, or a named message template
//! with its variables.

use super::{response_ids, Action, ActionReport};
use crate::error::{Error, ProviderError, Result};
use crate::filters::parse_options;
use crate::provider::ProviderRequest;
use crate::resource::{Record, ResourceDescriptor, RunContext};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Placeholder replaced by a JSON summary of the matched records
pub const RESOURCE_DETAILS_PLACEHOLDER: &str = "{resource_details}";

/// Publish one message to a topic, optionally in another region
pub async fn publish(
    ctx: &RunContext<'_>,
    topic_urn: &str,
    subject: &str,
    message: &str,
    region: Option<&str>,
) -> std::result::Result<Value, ProviderError> {
    publish_body(
        ctx,
        topic_urn,
        json!({"subject": subject, "message": message}),
        region,
    )
    .await
}

/// Publish a prepared request body to a topic
pub async fn publish_body(
    ctx: &RunContext<'_>,
    topic_urn: &str,
    body: Value,
    region: Option<&str>,
) -> std::result::Result<Value, ProviderError> {
    let mut request = ProviderRequest::new("smn", "publish_message")
        .param("topic_urn", topic_urn)
        .param("body", body);
    if let Some(region) = region {
        request = request.in_region(region);
    }

    let response = ctx.client.call(&request).await?;
    let (request_id, message_id) = response_ids(&response);
    tracing::info!(
        "published to {}: request_id={}, message_id={}",
        topic_urn,
        request_id,
        message_id
    );
    Ok(response)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NotifyOptions {
    topic_urn_list: Vec<String>,
    #[serde(default)]
    subject: String,
    message: String,
    #[serde(default)]
    resource_details_fields: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StructureOptions {
    topic_urn_list: Vec<String>,
    #[serde(default)]
    subject: String,
    message_structure: String,
    #[serde(default)]
    resource_details_fields: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateOptions {
    topic_urn_list: Vec<String>,
    #[serde(default)]
    subject: String,
    message_template_name: String,
    #[serde(default)]
    message_template_variables: Map<String, Value>,
    #[serde(default)]
    resource_details_fields: Option<Vec<String>>,
}

/// What a notification carries besides its subject
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Plain text, sent as `message`
    Message(String),
    /// JSON text keyed by protocol, sent as `message_structure`
    Structure(String),
    /// Named template, its variables sent as `tags`
    Template {
        name: String,
        variables: Map<String, Value>,
    },
}

impl Payload {
    fn uses_details(&self) -> bool {
        match self {
            Payload::Message(text) | Payload::Structure(text) => text.contains(RESOURCE_DETAILS_PLACEHOLDER),
            Payload::Template { variables, .. } => variables
                .values()
                .any(|v| v.as_str().is_some_and(|s| s.contains(RESOURCE_DETAILS_PLACEHOLDER))),
        }
    }
}

/// `notify-message` and its variants: one publish per topic for the whole
/// record set
#[derive(Debug)]
pub struct NotifyMessage {
    kind: &'static str,
    topics: Vec<String>,
    subject: String,
    payload: Payload,
    fields: Vec<String>,
}

pub(crate) fn build_notify_message(config: &Value, _descriptor: &ResourceDescriptor) -> Result<Box<dyn Action>> {
    let options: NotifyOptions = parse_options("notify-message", config)?;
    Ok(Box::new(NotifyMessage::new(
        "notify-message",
        options.topic_urn_list,
        options.subject,
        Payload::Message(options.message),
        options.resource_details_fields,
    )?))
}

pub(crate) fn build_notify_message_structure(
    config: &Value,
    _descriptor: &ResourceDescriptor,
) -> Result<Box<dyn Action>> {
    let options: StructureOptions = parse_options("notify-message-structure", config)?;
    Ok(Box::new(NotifyMessage::new(
        "notify-message-structure",
        options.topic_urn_list,
        options.subject,
        Payload::Structure(options.message_structure),
        options.resource_details_fields,
    )?))
}

pub(crate) fn build_notify_message_template(
    config: &Value,
    _descriptor: &ResourceDescriptor,
) -> Result<Box<dyn Action>> {
    let options: TemplateOptions = parse_options("notify-message-template", config)?;
    if options.message_template_name.trim().is_empty() {
        return Err(Error::config("notify-message-template needs a 'message_template_name'"));
    }
    Ok(Box::new(NotifyMessage::new(
        "notify-message-template",
        options.topic_urn_list,
        options.subject,
        Payload::Template {
            name: options.message_template_name,
            variables: options.message_template_variables,
        },
        options.resource_details_fields,
    )?))
}

fn valid_fields(fields: &[String]) -> bool {
    !fields.is_empty()
        && fields.iter().all(|f| {
            !f.is_empty() && f.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
}

impl NotifyMessage {
    pub fn new(
        kind: &'static str,
        topics: Vec<String>,
        subject: String,
        payload: Payload,
        requested_fields: Option<Vec<String>>,
    ) -> Result<Self> {
        if topics.is_empty() {
            return Err(Error::config(format!(
                "{} needs at least one topic in 'topic_urn_list'",
                kind
            )));
        }

        let fields = match requested_fields {
            Some(fields) if valid_fields(&fields) => fields,
            requested => {
                if payload.uses_details() {
                    tracing::warn!("{}: invalid resource_details_fields {:?}, using [\"id\"]", kind, requested);
                }
                vec!["id".to_string()]
            },
        };

        Ok(Self {
            kind,
            topics,
            subject,
            payload,
            fields,
        })
    }

    /// JSON summary of the selected fields of every record
    fn details(&self, records: &[Record], resource_type: &str) -> String {
        let details: Vec<Value> = records
            .iter()
            .map(|record| {
                let mut detail = Map::new();
                for field in &self.fields {
                    let value = record.get(field).cloned().unwrap_or(Value::Null);
                    if value.is_null() {
                        tracing::warn!(
                            "{}: record {} has no value for '{}'",
                            self.kind,
                            record.display_id(),
                            field
                        );
                    }
                    detail.insert(field.clone(), value);
                }
                Value::Object(detail)
            })
            .collect();

        json!({
            "resource_type": resource_type,
            "resource_details": details,
        })
        .to_string()
    }

    /// Request body with the placeholder expanded
    pub fn body(&self, records: &[Record], resource_type: &str) -> Value {
        let details = || self.details(records, resource_type);
        let expand = |text: &str| {
            if text.contains(RESOURCE_DETAILS_PLACEHOLDER) {
                text.replace(RESOURCE_DETAILS_PLACEHOLDER, &details())
            } else {
                text.to_string()
            }
        };

        match &self.payload {
            Payload::Message(message) => json!({
                "subject": self.subject,
                "message": expand(message),
            }),
            Payload::Structure(structure) => {
                // the details land inside JSON string values
                let text = if structure.contains(RESOURCE_DETAILS_PLACEHOLDER) {
                    structure.replace(RESOURCE_DETAILS_PLACEHOLDER, &details().replace('"', "\\\""))
                } else {
                    structure.clone()
                };
                json!({
                    "subject": self.subject,
                    "message_structure": text,
                })
            },
            Payload::Template { name, variables } => {
                let tags: Map<String, Value> = variables
                    .iter()
                    .map(|(key, value)| {
                        let value = match value.as_str() {
                            Some(text) => Value::String(expand(text)),
                            None => value.clone(),
                        };
                        (key.clone(), value)
                    })
                    .collect();
                json!({
                    "subject": self.subject,
                    "message_template_name": name,
                    "tags": tags,
                })
            },
        }
    }

    /// Message text of a plain notification
    pub fn render(&self, records: &[Record], resource_type: &str) -> String {
        match self.body(records, resource_type).get("message") {
            Some(Value::String(message)) => message.clone(),
            _ => String::new(),
        }
    }
}

#[async_trait]
impl Action for NotifyMessage {
    fn kind(&self) -> &'static str {
        self.kind
    }

    async fn process(&self, records: &[Record], ctx: &RunContext<'_>) -> Result<ActionReport> {
        let mut report = ActionReport::new(self.kind());
        let body = self.body(records, &ctx.descriptor.service);

        for topic in &self.topics {
            match publish_body(ctx, topic, body.clone(), None).await {
                Ok(response) => report.responses.push(response),
                Err(e) => {
                    tracing::error!(
                        "{}: publishing {} record(s) of {} to {} failed: {}",
                        self.kind,
                        records.len(),
                        ctx.descriptor.key,
                        topic,
                        e
                    );
                    report.failed_all(records, &Error::Provider(e));
                    return Ok(report);
                },
            }
        }

        report.succeeded_all(records);
        Ok(report)
    }
}
