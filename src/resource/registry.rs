//! Resource Registry
//!
//! Maps resource type names to their descriptor plus the filters and actions
//! they support. A [`Registry`] is an ordinary value: build one with
//! [`Registry::with_builtins`] and pass it to the policy loader.

use super::descriptor::{builtin_descriptors, ResourceDescriptor};
use crate::actions::{self, Action};
use crate::error::{Error, Result};
use crate::filters::{self, config_type, Filter};
use serde_json::Value;
use std::collections::BTreeMap;

/// Builds a validated filter from its configuration entry
pub type FilterFactory = fn(&Value, &ResourceDescriptor) -> Result<Box<dyn Filter>>;

/// Builds a validated action from its configuration entry
pub type ActionFactory = fn(&Value, &ResourceDescriptor) -> Result<Box<dyn Action>>;

/// Provider-qualified resource names (`huaweicloud.alarm`) resolve to `alarm`
pub const PROVIDER_PREFIX: &str = "huaweicloud.";

/// One resource type: descriptor plus its filter and action factories
#[derive(Clone)]
pub struct ResourceType {
    pub descriptor: ResourceDescriptor,
    filters: BTreeMap<String, FilterFactory>,
    actions: BTreeMap<String, ActionFactory>,
}

impl ResourceType {
    pub fn new(descriptor: ResourceDescriptor) -> Self {
        Self {
            descriptor,
            filters: BTreeMap::new(),
            actions: BTreeMap::new(),
        }
    }

    pub fn register_filter(&mut self, name: &str, factory: FilterFactory) {
        self.filters.insert(name.to_string(), factory);
    }

    pub fn register_action(&mut self, name: &str, factory: ActionFactory) {
        self.actions.insert(name.to_string(), factory);
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.keys().map(|s| s.as_str()).collect()
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.actions.keys().map(|s| s.as_str()).collect()
    }

    /// Build a filter from a `{type: ..}` mapping or a bare type string
    pub fn build_filter(&self, config: &Value) -> Result<Box<dyn Filter>> {
        let kind = config_type(config)?;
        let factory = self.filters.get(kind).ok_or_else(|| {
            Error::config(format!(
                "unknown filter '{}' for resource '{}' (available: {})",
                kind,
                self.descriptor.key,
                self.filter_names().join(", ")
            ))
        })?;
        factory(config, &self.descriptor)
    }

    /// Build an action from a `{type: ..}` mapping or a bare type string
    pub fn build_action(&self, config: &Value) -> Result<Box<dyn Action>> {
        let kind = config_type(config)?;
        let factory = self.actions.get(kind).ok_or_else(|| {
            Error::config(format!(
                "unknown action '{}' for resource '{}' (available: {})",
                kind,
                self.descriptor.key,
                self.action_names().join(", ")
            ))
        })?;
        factory(config, &self.descriptor)
    }
}

impl std::fmt::Debug for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceType")
            .field("key", &self.descriptor.key)
            .field("filters", &self.filter_names())
            .field("actions", &self.action_names())
            .finish()
    }
}

/// All known resource types
#[derive(Debug, Clone, Default)]
pub struct Registry {
    resources: BTreeMap<String, ResourceType>,
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the embedded Huawei Cloud resource types
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();

        for descriptor in builtin_descriptors()? {
            let mut resource = ResourceType::new(descriptor);
            filters::register_common(&mut resource);
            actions::register_common(&mut resource);

            match resource.descriptor.key.as_str() {
                "alarm" => actions::alarm::register(&mut resource),
                "coc" => actions::coc::register(&mut resource),
                "lts-stream" => {
                    filters::stream::register(&mut resource);
                    actions::stream::register(&mut resource);
                },
                "lts-logstream" => filters::value::register_alias(&mut resource, "loggroup"),
                "vpcep-ep" => {
                    filters::vpcep::register(&mut resource);
                    actions::vpcep::register(&mut resource);
                },
                _ => {},
            }

            registry.register(resource);
        }

        Ok(registry)
    }

    pub fn register(&mut self, resource: ResourceType) {
        self.resources.insert(resource.descriptor.key.clone(), resource);
    }

    /// Look a resource type up, accepting the provider-qualified name
    pub fn get(&self, name: &str) -> Option<&ResourceType> {
        let key = name.strip_prefix(PROVIDER_PREFIX).unwrap_or(name);
        self.resources.get(key)
    }

    /// Like [`Registry::get`], with a configuration error for unknown names
    pub fn resource(&self, name: &str) -> Result<&ResourceType> {
        self.get(name).ok_or_else(|| {
            Error::config(format!(
                "unknown resource type '{}' (available: {})",
                name,
                self.resource_names().join(", ")
            ))
        })
    }

    pub fn resource_names(&self) -> Vec<&str> {
        self.resources.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> Registry {
        Registry::with_builtins().unwrap()
    }

    #[test]
    fn test_builtins_registered() {
        let registry = registry();
        for key in ["alarm", "coc", "lts-logstream", "lts-stream", "vpcep-ep"] {
            assert!(registry.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn test_provider_prefix_accepted() {
        let registry = registry();
        assert_eq!(registry.get("huaweicloud.alarm").unwrap().descriptor.service, "ces");
        assert!(registry.resource("huaweicloud.nope").unwrap_err().is_config());
    }

    #[test]
    fn test_type_specific_registrations() {
        let registry = registry();

        let alarm = registry.get("alarm").unwrap();
        assert!(alarm.action_names().contains(&"delete"));
        assert!(alarm.filter_names().contains(&"tag-count"));

        let streams = registry.get("lts-stream").unwrap();
        assert!(streams.filter_names().contains(&"streams-storage-enabled-for-schedule"));
        assert!(streams.action_names().contains(&"disable-stream-storage"));
        assert!(!streams.action_names().contains(&"delete"));

        let groups = registry.get("lts-logstream").unwrap();
        assert!(groups.filter_names().contains(&"loggroup"));
        assert!(!groups.filter_names().contains(&"tag-count"));

        let coc = registry.get("coc").unwrap();
        assert!(coc.action_names().contains(&"non_compliant_alarm"));
        for common in ["notify-message", "notify-message-structure", "notify-message-template"] {
            assert!(coc.action_names().contains(&common), "{common}");
        }
    }

    #[test]
    fn test_unknown_filter_is_config_error() {
        let registry = registry();
        let alarm = registry.get("alarm").unwrap();
        let err = alarm.build_filter(&json!({"type": "marked-for-op"})).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("marked-for-op"));
    }

    #[test]
    fn test_builds_from_bare_string() {
        let registry = registry();
        let alarm = registry.get("alarm").unwrap();
        assert_eq!(alarm.build_action(&json!("delete")).unwrap().kind(), "delete");
        assert_eq!(alarm.build_filter(&json!("tag-count")).unwrap().kind(), "tag-count");
    }

    #[test]
    fn test_custom_resource_type() {
        let mut registry = Registry::new();
        let descriptor = ResourceDescriptor::new("x", "svc", "list_x", "items", "id");
        let mut resource = ResourceType::new(descriptor);
        filters::register_common(&mut resource);
        registry.register(resource);

        let x = registry.get("x").unwrap();
        assert!(x.build_filter(&json!({"type": "value", "key": "a", "value": 1})).is_ok());
        assert!(!x.filter_names().contains(&"tag-count"));
    }
}
