//! VPC endpoint coverage check

use super::{parse_options, Filter};
use crate::error::{Error, Result};
use crate::resource::{Record, ResourceDescriptor, ResourceType, RunContext};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;

pub fn register(resource: &mut ResourceType) {
    resource.register_filter("by-service-and-vpc-check", build);
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CheckOptions {
    #[serde(default)]
    endpoint_service_name: Option<String>,
    #[serde(default)]
    vpc_ids: Vec<String>,
}

/// Reports an endpoint service that is not reachable from the expected VPCs.
///
/// The output replaces the endpoint set:
/// - no endpoint uses the service: one record naming the service
/// - some `vpc_ids` have no endpoint to it: one record listing those VPCs
/// - otherwise: nothing
#[derive(Debug)]
pub struct ServiceAndVpcCheck {
    endpoint_service_name: String,
    vpc_ids: Vec<String>,
}

fn build(config: &Value, _descriptor: &ResourceDescriptor) -> Result<Box<dyn Filter>> {
    let options: CheckOptions = parse_options("by-service-and-vpc-check", config)?;
    let endpoint_service_name = options
        .endpoint_service_name
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| Error::config("by-service-and-vpc-check needs 'endpoint_service_name'"))?;

    Ok(Box::new(ServiceAndVpcCheck {
        endpoint_service_name,
        vpc_ids: options.vpc_ids,
    }))
}

impl ServiceAndVpcCheck {
    pub fn check(&self, endpoints: &[Record]) -> Result<Vec<Record>> {
        let matching: Vec<&Record> = endpoints
            .iter()
            .filter(|r| {
                r.get("endpoint_service_name").and_then(|v| v.as_str())
                    == Some(self.endpoint_service_name.as_str())
            })
            .collect();

        if matching.is_empty() {
            tracing::info!("no endpoint uses service {}", self.endpoint_service_name);
            return Ok(vec![Record::from_value(json!({
                "endpoint_service_name": self.endpoint_service_name,
            }))?]);
        }

        if self.vpc_ids.is_empty() {
            return Ok(Vec::new());
        }

        let covered: HashSet<&str> = matching
            .iter()
            .filter_map(|r| r.get("vpc_id").and_then(|v| v.as_str()))
            .collect();
        let missing: Vec<&String> = self
            .vpc_ids
            .iter()
            .filter(|id| !covered.contains(id.as_str()))
            .collect();

        if missing.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!(
            "service {} has no endpoint in VPC(s): {}",
            self.endpoint_service_name,
            missing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        );
        Ok(vec![Record::from_value(json!({
            "endpoint_service_name": self.endpoint_service_name,
            "vpc_ids": missing,
        }))?])
    }
}

#[async_trait]
impl Filter for ServiceAndVpcCheck {
    fn kind(&self) -> &'static str {
        "by-service-and-vpc-check"
    }

    async fn process(&self, records: Vec<Record>, _ctx: &RunContext<'_>) -> Result<Vec<Record>> {
        self.check(&records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE: &str = "com.myhuaweicloud.cn-north-4.obs";

    fn check(config: Value) -> ServiceAndVpcCheck {
        let options: CheckOptions = parse_options("by-service-and-vpc-check", &config).unwrap();
        ServiceAndVpcCheck {
            endpoint_service_name: options.endpoint_service_name.unwrap(),
            vpc_ids: options.vpc_ids,
        }
    }

    fn endpoint(service: &str, vpc: &str) -> Record {
        Record::from_value(json!({"id": format!("ep-{vpc}"), "endpoint_service_name": service, "vpc_id": vpc})).unwrap()
    }

    #[test]
    fn test_no_matching_endpoint_names_the_service() {
        let out = check(json!({"endpoint_service_name": SERVICE})).check(&[endpoint("other", "vpc-1")]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].clone().into_value(), json!({"endpoint_service_name": SERVICE}));

        let out = check(json!({"endpoint_service_name": SERVICE})).check(&[]).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_without_vpc_ids_a_match_is_enough() {
        let out = check(json!({"endpoint_service_name": SERVICE})).check(&[endpoint(SERVICE, "vpc-1")]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_missing_vpcs_are_listed_in_order() {
        let filter = check(json!({
            "endpoint_service_name": SERVICE,
            "vpc_ids": ["vpc-3", "vpc-1", "vpc-2"],
        }));
        let out = filter.check(&[endpoint(SERVICE, "vpc-1"), endpoint("other", "vpc-2")]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("vpc_ids"), Some(&json!(["vpc-3", "vpc-2"])));
    }

    #[test]
    fn test_all_vpcs_covered() {
        let filter = check(json!({"endpoint_service_name": SERVICE, "vpc_ids": ["vpc-1"]}));
        assert!(filter.check(&[endpoint(SERVICE, "vpc-1")]).unwrap().is_empty());
    }

    #[test]
    fn test_service_name_required() {
        let descriptor = ResourceDescriptor::new("vpcep-ep", "vpcep", "list_endpoints", "endpoints", "id");
        assert!(build(&json!({"vpc_ids": ["vpc-1"]}), &descriptor).unwrap_err().is_config());
        assert!(build(&json!({"endpoint_service_name": " "}), &descriptor).unwrap_err().is_config());
    }
}
