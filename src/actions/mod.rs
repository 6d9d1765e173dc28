//! Actions
//!
//! An action runs once over the records that survived a policy's filters.
//! Aggregate actions (notifications) see the whole set at once; per-record
//! actions implement [`PerRecordAction`] and are driven by [`EachRecord`],
//! which keeps going after a failed record and reports it.
//!
//! - [`alarm`] - `delete` for Cloud Eye alarm rules
//! - [`coc`] - `non_compliant_alarm` for patch compliance records
//! - [`smn`] - `notify-message` and its structure/template variants, on every resource type
//! - [`stream`] - `disable-stream-storage` for LTS log streams
//! - [`vpcep`] - `eps-check-ep-msg` for VPC endpoint checks

pub mod alarm;
pub mod coc;
pub mod smn;
pub mod stream;
pub mod vpcep;

use crate::error::{Error, Result};
use crate::resource::{Record, ResourceType, RunContext};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Something done to the matched records
#[async_trait]
pub trait Action: Send + Sync + std::fmt::Debug {
    /// Registered type name
    fn kind(&self) -> &'static str;

    /// Run over the whole record set
    async fn process(&self, records: &[Record], ctx: &RunContext<'_>) -> Result<ActionReport>;
}

/// An action applied to one record at a time
#[async_trait]
pub trait PerRecordAction: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> &'static str;

    /// Act on one record, returning the provider response when there is one
    async fn perform(&self, record: &Record, ctx: &RunContext<'_>) -> Result<Option<Value>>;
}

/// Drives a [`PerRecordAction`] over every record
#[derive(Debug)]
pub struct EachRecord<A>(pub A);

#[async_trait]
impl<A: PerRecordAction> Action for EachRecord<A> {
    fn kind(&self) -> &'static str {
        self.0.kind()
    }

    async fn process(&self, records: &[Record], ctx: &RunContext<'_>) -> Result<ActionReport> {
        let mut report = ActionReport::new(self.kind());

        for record in records {
            match self.0.perform(record, ctx).await {
                Ok(response) => report.succeeded(record, response),
                Err(e) => {
                    tracing::error!(
                        "{} on {} {} failed: {}",
                        self.kind(),
                        ctx.descriptor.key,
                        record.display_id(),
                        e
                    );
                    report.failed(record, &e);
                },
            }
        }

        Ok(report)
    }
}

/// Box a per-record action as an [`Action`]
pub fn per_record<A: PerRecordAction + 'static>(action: A) -> Box<dyn Action> {
    Box::new(EachRecord(action))
}

/// A record an action could not handle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub id: String,
    pub error: String,
}

/// Outcome of one action over a record set
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionReport {
    pub action: String,
    pub succeeded: Vec<String>,
    pub failed: Vec<Failure>,
    /// Provider responses, in call order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub responses: Vec<Value>,
}

impl ActionReport {
    pub fn new(action: &str) -> Self {
        Self {
            action: action.to_string(),
            ..Self::default()
        }
    }

    pub fn succeeded(&mut self, record: &Record, response: Option<Value>) {
        self.succeeded.push(record.display_id());
        if let Some(response) = response {
            self.responses.push(response);
        }
    }

    pub fn failed(&mut self, record: &Record, error: &Error) {
        self.failed.push(Failure {
            id: record.display_id(),
            error: error.to_string(),
        });
    }

    /// Mark a whole batch as handled by one aggregate call
    pub fn succeeded_all(&mut self, records: &[Record]) {
        self.succeeded.extend(records.iter().map(Record::display_id));
    }

    /// Mark a whole batch as failed by one aggregate call
    pub fn failed_all(&mut self, records: &[Record], error: &Error) {
        for record in records {
            self.failed(record, error);
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Register the actions available on every resource type
pub fn register_common(resource: &mut ResourceType) {
    resource.register_action("notify-message", smn::build_notify_message);
    resource.register_action("notify-message-structure", smn::build_notify_message_structure);
    resource.register_action("notify-message-template", smn::build_notify_message_template);
}

/// Pull the provider's `request_id` / `message_id` out of a response
pub(crate) fn response_ids(response: &Value) -> (&str, &str) {
    let field = |key: &str| response.get(key).and_then(|v| v.as_str());
    (field("request_id").unwrap_or("-"), field("message_id").unwrap_or("-"))
}
