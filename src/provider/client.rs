//! Provider Client
//!
//! [`ProviderClient`] is the seam between the adapters and the cloud API:
//! enumerators, filters and actions only ever issue [`ProviderRequest`]s.
//! [`HuaweiCloudClient`] is the REST implementation.

use super::dispatch;
use super::http::HttpClient;
use crate::config::Settings;
use crate::error::{Error, ProviderError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One provider API call: service, operation and its parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub service: String,
    pub operation: String,
    pub params: Map<String, Value>,
    /// Region override; the client's region is used when absent
    pub region: Option<String>,
}

impl ProviderRequest {
    pub fn new(service: &str, operation: &str) -> Self {
        Self {
            service: service.to_string(),
            operation: operation.to_string(),
            params: Map::new(),
            region: None,
        }
    }

    /// Add or replace a parameter
    #[must_use]
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Target a specific region
    #[must_use]
    pub fn in_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }
}

/// Something that can execute provider API calls
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn call(&self, request: &ProviderRequest) -> std::result::Result<Value, ProviderError>;
}

/// Huawei Cloud REST client
#[derive(Clone)]
pub struct HuaweiCloudClient {
    pub http: HttpClient,
    pub settings: Settings,
    pub region: String,
    pub project_id: String,
    token: String,
}

impl HuaweiCloudClient {
    /// Create a new client; the endpoint pattern is checked up front
    pub fn new(settings: Settings, region: &str, project_id: &str, token: &str) -> Result<Self> {
        if region.is_empty() {
            return Err(Error::config("no region configured"));
        }
        if project_id.is_empty() {
            return Err(Error::config("no project id configured"));
        }

        let probe = settings.endpoint("probe", region);
        url::Url::parse(&probe)
            .map_err(|e| Error::config(format!("invalid endpoint '{}': {}", probe, e)))?;

        let http = HttpClient::new()?;

        Ok(Self {
            http,
            settings,
            region: region.to_string(),
            project_id: project_id.to_string(),
            token: token.to_string(),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Build the URL of `path` on `service`, in `region` or the client's region
    pub fn service_url(&self, service: &str, region: Option<&str>, path: &str) -> String {
        let base = self
            .settings
            .endpoint(service, region.unwrap_or(&self.region));
        format!("{}/{}", base, path.trim_start_matches('/'))
    }

    /// Build a project-scoped URL, e.g. `/v2/{project_id}/groups`
    pub fn project_url(&self, service: &str, region: Option<&str>, version: &str, path: &str) -> String {
        self.service_url(
            service,
            region,
            &format!("{}/{}/{}", version, self.project_id, path),
        )
    }
}

#[async_trait]
impl ProviderClient for HuaweiCloudClient {
    async fn call(&self, request: &ProviderRequest) -> std::result::Result<Value, ProviderError> {
        dispatch::invoke(self, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn client() -> HuaweiCloudClient {
        HuaweiCloudClient::new(Settings::default(), "cn-north-4", "proj-1", "token").unwrap()
    }

    #[test]
    fn test_project_url() {
        let client = client();
        assert_eq!(
            client.project_url("lts", None, "v2", "groups"),
            "https://lts.cn-north-4.myhuaweicloud.com/v2/proj-1/groups"
        );
        assert_eq!(
            client.project_url("smn", Some("cn-east-3"), "v2", "notifications/topics"),
            "https://smn.cn-east-3.myhuaweicloud.com/v2/proj-1/notifications/topics"
        );
    }

    #[test]
    fn test_rejects_missing_region() {
        let err = HuaweiCloudClient::new(Settings::default(), "", "proj", "t").err();
        assert!(matches!(err, Some(Error::Config(_))));
    }

    #[test]
    fn test_rejects_invalid_endpoint() {
        let settings = Settings {
            endpoint_template: "not a url".to_string(),
            endpoints: HashMap::new(),
            ..Settings::default()
        };
        let err = HuaweiCloudClient::new(settings, "cn-north-4", "proj", "t").err();
        assert!(matches!(err, Some(Error::Config(_))));
    }

    #[test]
    fn test_request_builder() {
        let request = ProviderRequest::new("lts", "list_log_stream")
            .param("log_group_id", "g-1")
            .param("limit", 10)
            .in_region("cn-east-3");
        assert_eq!(request.get_str("log_group_id"), Some("g-1"));
        assert_eq!(request.params["limit"], 10);
        assert_eq!(request.region.as_deref(), Some("cn-east-3"));
    }
}
