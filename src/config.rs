//! Configuration Management
//!
//! Handles the settings file for hwcgov and the per-run options derived
//! from it.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default endpoint pattern; `{service}` and `{region}` are substituted
pub const DEFAULT_ENDPOINT_TEMPLATE: &str = "https://{service}.{region}.myhuaweicloud.com";

/// Environment variable holding the auth token, unless overridden
pub const DEFAULT_AUTH_TOKEN_ENV: &str = "HUAWEICLOUD_AUTH_TOKEN";

const DEFAULT_PAGE_LIMIT: u32 = 100;
const DEFAULT_SECONDARY_CALL_DELAY_MS: u64 = 220;
const DEFAULT_ACTION_CALL_DELAY_MS: u64 = 300;

/// User settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Region to operate in, e.g. `cn-north-4`
    pub region: Option<String>,
    /// Project id used in API paths
    pub project_id: Option<String>,
    /// Endpoint pattern applied to every service without an override
    pub endpoint_template: String,
    /// Per-service endpoint overrides (also patterns)
    pub endpoints: HashMap<String, String>,
    /// Name of the environment variable carrying the auth token
    pub auth_token_env: String,
    /// Page size sent to paginated listings
    pub page_limit: u32,
    /// Pause between secondary listing calls
    pub secondary_call_delay_ms: u64,
    /// Pause before each rate-sensitive action call
    pub action_call_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let mut endpoints = HashMap::new();
        // COC is a global service
        endpoints.insert("coc".to_string(), "https://coc.myhuaweicloud.com".to_string());

        Self {
            region: None,
            project_id: None,
            endpoint_template: DEFAULT_ENDPOINT_TEMPLATE.to_string(),
            endpoints,
            auth_token_env: DEFAULT_AUTH_TOKEN_ENV.to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
            secondary_call_delay_ms: DEFAULT_SECONDARY_CALL_DELAY_MS,
            action_call_delay_ms: DEFAULT_ACTION_CALL_DELAY_MS,
        }
    }
}

impl Settings {
    /// Default settings file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("hwcgov").join("config.json"))
    }

    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring unreadable settings file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Load settings from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::config(format!("invalid settings in {}: {}", path.display(), e)))
    }

    /// Effective region (explicit > settings > environment)
    pub fn effective_region(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.region.clone())
            .or_else(|| std::env::var("HUAWEICLOUD_REGION").ok())
            .filter(|r| !r.is_empty())
    }

    /// Effective project id (explicit > settings > environment)
    pub fn effective_project(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.project_id.clone())
            .or_else(|| std::env::var("HUAWEICLOUD_PROJECT_ID").ok())
            .filter(|p| !p.is_empty())
    }

    /// Read the auth token from the configured environment variable
    pub fn auth_token(&self) -> Option<String> {
        std::env::var(&self.auth_token_env).ok().filter(|t| !t.is_empty())
    }

    /// Base URL for a service in a region
    pub fn endpoint(&self, service: &str, region: &str) -> String {
        let pattern = self
            .endpoints
            .get(service)
            .unwrap_or(&self.endpoint_template);
        pattern
            .replace("{service}", service)
            .replace("{region}", region)
            .trim_end_matches('/')
            .to_string()
    }

    /// Options handed to enumerators, filters and actions
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            page_limit: self.page_limit.max(1),
            secondary_call_delay: Duration::from_millis(self.secondary_call_delay_ms),
            action_call_delay: Duration::from_millis(self.action_call_delay_ms),
        }
    }
}

/// Tunables shared by one policy run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub page_limit: u32,
    pub secondary_call_delay: Duration,
    pub action_call_delay: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Settings::default().run_options()
    }
}

impl RunOptions {
    /// Options without any pacing delays (tests, replay)
    pub fn without_delays(mut self) -> Self {
        self.secondary_call_delay = Duration::ZERO;
        self.action_call_delay = Duration::ZERO;
        self
    }
}
