//! Resource Descriptors
//!
//! Static metadata describing how to enumerate one resource type. The
//! built-in descriptors are loaded from JSON embedded at compile time, so a
//! new resource type only needs a new entry in `src/resources/`.

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Embedded descriptor files (compiled into the binary)
const DESCRIPTOR_FILES: &[&str] = &[include_str!("../resources/huaweicloud.json")];

fn default_next_marker_path() -> String {
    "page_info.next_marker".to_string()
}

/// How a listing operation pages through its results
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Pagination {
    /// One call returns everything
    #[default]
    None,
    /// `limit` + numeric `offset`, starting at `start`
    Offset {
        #[serde(default)]
        start: u64,
    },
    /// `limit` + opaque `marker` read from the previous response
    Marker {
        #[serde(default = "default_next_marker_path")]
        next_marker_path: String,
    },
}

/// Descriptor for one resource type
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceDescriptor {
    /// Registry key, filled from the map key when loading
    #[serde(default)]
    pub key: String,
    pub display_name: String,
    pub service: String,
    pub list_operation: String,
    /// Static parameters sent with every listing call
    #[serde(default)]
    pub list_params: Map<String, Value>,
    /// Dotted path to the record array in a listing response
    pub response_path: String,
    pub id_field: String,
    #[serde(default)]
    pub name_field: Option<String>,
    /// Field used by age filters when none is configured
    #[serde(default)]
    pub date_field: Option<String>,
    #[serde(default)]
    pub pagination: Pagination,
    /// Whether records carry tags (enables tag filters)
    #[serde(default)]
    pub taggable: bool,
    #[serde(default)]
    pub tag_resource_type: Option<String>,
}

impl ResourceDescriptor {
    /// Minimal descriptor, mostly useful for tests and ad-hoc listings
    pub fn new(key: &str, service: &str, list_operation: &str, response_path: &str, id_field: &str) -> Self {
        Self {
            key: key.to_string(),
            display_name: key.to_string(),
            service: service.to_string(),
            list_operation: list_operation.to_string(),
            list_params: Map::new(),
            response_path: response_path.to_string(),
            id_field: id_field.to_string(),
            name_field: None,
            date_field: None,
            pagination: Pagination::None,
            taggable: false,
            tag_resource_type: None,
        }
    }

    #[must_use]
    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    #[must_use]
    pub fn with_name_field(mut self, field: &str) -> Self {
        self.name_field = Some(field.to_string());
        self
    }

    #[must_use]
    pub fn taggable(mut self) -> Self {
        self.taggable = true;
        self
    }

    fn validate(&self) -> Result<()> {
        for (what, value) in [
            ("service", &self.service),
            ("list_operation", &self.list_operation),
            ("response_path", &self.response_path),
            ("id_field", &self.id_field),
        ] {
            if value.trim().is_empty() {
                return Err(Error::config(format!(
                    "resource '{}' has an empty {}",
                    self.key, what
                )));
            }
        }
        Ok(())
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Deserialize)]
struct DescriptorFile {
    #[serde(default)]
    resources: BTreeMap<String, ResourceDescriptor>,
}

/// Parse one descriptor document
pub fn parse_descriptors(content: &str) -> Result<Vec<ResourceDescriptor>> {
    let file: DescriptorFile = serde_json::from_str(content)
        .map_err(|e| Error::config(format!("invalid resource descriptor JSON: {}", e)))?;

    file.resources
        .into_iter()
        .map(|(key, mut descriptor)| {
            descriptor.key = key;
            descriptor.validate()?;
            Ok(descriptor)
        })
        .collect()
}

/// All descriptors compiled into the binary, parsed on first use
pub fn builtin_descriptors() -> Result<Vec<ResourceDescriptor>> {
    static BUILTIN: OnceLock<std::result::Result<Vec<ResourceDescriptor>, String>> = OnceLock::new();

    BUILTIN
        .get_or_init(|| {
            let mut all = Vec::new();
            for content in DESCRIPTOR_FILES {
                all.extend(parse_descriptors(content).map_err(|e| e.to_string())?);
            }
            Ok(all)
        })
        .clone()
        .map_err(Error::Config)
}
