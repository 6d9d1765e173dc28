//! Operation Dispatch
//!
//! Maps `(service, operation)` pairs to Huawei Cloud REST API calls.

use super::client::{HuaweiCloudClient, ProviderRequest};
use crate::error::ProviderError;
use serde_json::{Map, Value};

type DispatchResult = Result<Value, ProviderError>;

/// Invoke a provider operation over REST
pub async fn invoke(client: &HuaweiCloudClient, request: &ProviderRequest) -> DispatchResult {
    tracing::debug!(
        "invoke: service={}, operation={}",
        request.service,
        request.operation
    );

    match request.service.as_str() {
        "ces" => invoke_ces(client, request).await,
        "lts" => invoke_lts(client, request).await,
        "vpcep" => invoke_vpcep(client, request).await,
        "coc" => invoke_coc(client, request).await,
        "smn" => invoke_smn(client, request).await,
        _ => Err(unknown(request)),
    }
}

fn unknown(request: &ProviderRequest) -> ProviderError {
    ProviderError::UnknownOperation {
        service: request.service.clone(),
        operation: request.operation.clone(),
    }
}

// =============================================================================
// Cloud Eye (alarms)
// =============================================================================

async fn invoke_ces(client: &HuaweiCloudClient, request: &ProviderRequest) -> DispatchResult {
    let region = request.region.as_deref();
    match request.operation.as_str() {
        "list_alarms" => {
            let url = client.project_url("ces", region, "V1.0", "alarms");
            client
                .http
                .get(&url, client.token(), &query_params(&request.params, &[]))
                .await
        },
        "delete_alarm" => {
            let alarm_id = get_param_str(&request.params, "alarm_id")?;
            let url = client.project_url(
                "ces",
                region,
                "V1.0",
                &format!("alarms/{}", urlencoding::encode(&alarm_id)),
            );
            client.http.delete(&url, client.token()).await
        },
        _ => Err(unknown(request)),
    }
}

// =============================================================================
// Log Tank Service (log groups and streams)
// =============================================================================

async fn invoke_lts(client: &HuaweiCloudClient, request: &ProviderRequest) -> DispatchResult {
    let region = request.region.as_deref();
    match request.operation.as_str() {
        "list_log_groups" => {
            let url = client.project_url("lts", region, "v2", "groups");
            client
                .http
                .get(&url, client.token(), &query_params(&request.params, &[]))
                .await
        },
        "list_log_stream" => {
            let group_id = get_param_str(&request.params, "log_group_id")?;
            let url = client.project_url(
                "lts",
                region,
                "v2",
                &format!("groups/{}/streams", urlencoding::encode(&group_id)),
            );
            client
                .http
                .get(
                    &url,
                    client.token(),
                    &query_params(&request.params, &["log_group_id"]),
                )
                .await
        },
        "update_log_stream" => {
            let group_id = get_param_str(&request.params, "log_group_id")?;
            let stream_id = get_param_str(&request.params, "log_stream_id")?;
            let url = client.project_url(
                "lts",
                region,
                "v2",
                &format!(
                    "groups/{}/streams_ttl/{}",
                    urlencoding::encode(&group_id),
                    urlencoding::encode(&stream_id)
                ),
            );
            client
                .http
                .put(&url, client.token(), request.params.get("body"))
                .await
        },
        _ => Err(unknown(request)),
    }
}

// =============================================================================
// VPC Endpoint
// =============================================================================

async fn invoke_vpcep(client: &HuaweiCloudClient, request: &ProviderRequest) -> DispatchResult {
    match request.operation.as_str() {
        "list_endpoints" => {
            let url = client.project_url("vpcep", request.region.as_deref(), "v1", "vpc-endpoints");
            client
                .http
                .get(&url, client.token(), &query_params(&request.params, &[]))
                .await
        },
        _ => Err(unknown(request)),
    }
}

// =============================================================================
// Cloud Operations Center (patch compliance)
// =============================================================================

async fn invoke_coc(client: &HuaweiCloudClient, request: &ProviderRequest) -> DispatchResult {
    match request.operation.as_str() {
        "list_instance_compliant" => {
            let url = client.service_url("coc", request.region.as_deref(), "v1/instance-compliant");
            client
                .http
                .get(&url, client.token(), &query_params(&request.params, &[]))
                .await
        },
        _ => Err(unknown(request)),
    }
}

// =============================================================================
// Simple Message Notification
// =============================================================================

async fn invoke_smn(client: &HuaweiCloudClient, request: &ProviderRequest) -> DispatchResult {
    match request.operation.as_str() {
        "publish_message" => {
            let topic_urn = get_param_str(&request.params, "topic_urn")?;
            let url = client.project_url(
                "smn",
                request.region.as_deref(),
                "v2",
                &format!(
                    "notifications/topics/{}/publish",
                    urlencoding::encode(&topic_urn)
                ),
            );
            client
                .http
                .post(&url, client.token(), request.params.get("body"))
                .await
        },
        _ => Err(unknown(request)),
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn get_param_str(params: &Map<String, Value>, key: &str) -> Result<String, ProviderError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or_else(|| ProviderError::MissingParam(key.to_string()))
}

/// Turn scalar parameters into query pairs, skipping path parameters and bodies
fn query_params(params: &Map<String, Value>, skip: &[&str]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for (key, value) in params {
        if key == "body" || skip.contains(&key.as_str()) {
            continue;
        }

        match value {
            Value::String(s) => pairs.push((key.clone(), s.clone())),
            Value::Number(n) => pairs.push((key.clone(), n.to_string())),
            Value::Bool(b) => pairs.push((key.clone(), b.to_string())),
            Value::Array(arr) => {
                for item in arr {
                    if let Some(s) = item.as_str() {
                        pairs.push((key.clone(), s.to_string()));
                    }
                }
            },
            _ => {},
        }
    }

    pairs
}
