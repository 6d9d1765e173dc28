//! Policy loading and execution
//!
//! A policy names a resource type, a list of filters and a list of actions.
//! [`Policy::load`] builds every filter and action up front, so a bad entry
//! fails the load before any provider call is made.

use crate::actions::{Action, ActionReport};
use crate::config::RunOptions;
use crate::error::{Error, Result};
use crate::filters::Filter;
use crate::provider::ProviderClient;
use crate::resource::{enumerate, Record, Registry, ResourceType, RunContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::Instrument;

/// One policy as written in a policy file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    pub name: String,
    pub resource: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub filters: Vec<Value>,
    #[serde(default)]
    pub actions: Vec<Value>,
}

/// Root of a policy file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyFile {
    pub policies: Vec<PolicyConfig>,
}

impl PolicyFile {
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::config(format!("invalid policy file: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }
}

/// A validated policy, ready to run
#[derive(Debug)]
pub struct Policy<'r> {
    pub name: String,
    resource: &'r ResourceType,
    filters: Vec<Box<dyn Filter>>,
    actions: Vec<Box<dyn Action>>,
}

/// What a policy run produced
#[derive(Debug, Clone, Serialize)]
pub struct PolicyOutcome {
    pub policy: String,
    pub resource: String,
    pub run_id: String,
    pub resources: Vec<Record>,
    pub actions: Vec<ActionReport>,
}

impl<'r> Policy<'r> {
    /// Resolve the resource type and build every filter and action
    pub fn load(registry: &'r Registry, config: &PolicyConfig) -> Result<Self> {
        let resource = registry.resource(&config.resource)?;

        let filters = config
            .filters
            .iter()
            .map(|f| resource.build_filter(f))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| in_policy(&config.name, e))?;
        let actions = config
            .actions
            .iter()
            .map(|a| resource.build_action(a))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| in_policy(&config.name, e))?;

        tracing::debug!(
            "policy {} loaded: {} filter(s), {} action(s) on {}",
            config.name,
            filters.len(),
            actions.len(),
            resource.descriptor.key
        );

        Ok(Self {
            name: config.name.clone(),
            resource,
            filters,
            actions,
        })
    }

    /// Load every policy of a file; the first invalid one aborts
    pub fn load_all(registry: &'r Registry, file: &PolicyFile) -> Result<Vec<Self>> {
        file.policies.iter().map(|p| Self::load(registry, p)).collect()
    }

    pub fn resource_type(&self) -> &str {
        &self.resource.descriptor.key
    }

    /// Enumerate, filter, then act (unless `dry_run`)
    pub async fn run(&self, client: &dyn ProviderClient, options: RunOptions, dry_run: bool) -> Result<PolicyOutcome> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("policy", name = %self.name, run_id = %run_id);

        async {
            let ctx = RunContext {
                client,
                descriptor: &self.resource.descriptor,
                options,
            };

            let mut records = enumerate(ctx.descriptor, client, &options).await?;
            tracing::info!("{} {} record(s) enumerated", records.len(), ctx.descriptor.key);

            for filter in &self.filters {
                let before = records.len();
                records = filter.process(records, &ctx).await?;
                tracing::info!("filter {}: {} -> {} record(s)", filter.kind(), before, records.len());
            }

            let mut reports = Vec::new();
            if dry_run {
                tracing::info!("dry run, skipping {} action(s)", self.actions.len());
            } else if records.is_empty() {
                tracing::info!("no matching records, skipping actions");
            } else {
                for action in &self.actions {
                    let report = action.process(&records, &ctx).await?;
                    tracing::info!(
                        "action {}: {} succeeded, {} failed",
                        report.action,
                        report.succeeded.len(),
                        report.failed.len()
                    );
                    reports.push(report);
                }
            }

            Ok::<_, Error>(PolicyOutcome {
                policy: self.name.clone(),
                resource: ctx.descriptor.key.clone(),
                run_id: run_id.clone(),
                resources: records,
                actions: reports,
            })
        }
        .instrument(span)
        .await
    }
}

fn in_policy(name: &str, error: Error) -> Error {
    match error {
        Error::Config(msg) => Error::Config(format!("policy '{}': {}", name, msg)),
        other => other,
    }
}
