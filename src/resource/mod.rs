//! Resource abstraction layer
//!
//! Resource types are data-driven: each one is a [`ResourceDescriptor`]
//! loaded from JSON embedded at compile time, paired in the [`Registry`]
//! with the filters and actions it supports.
//!
//! # Architecture
//!
//! - [`descriptor`] - static per-type metadata (service, listing call, id field, paging)
//! - [`enumerator`] - lists every record of a type, following its pagination style
//! - [`record`] - the dynamic record shape filters and actions work on
//! - [`registry`] - resource type lookup and filter/action factories
//!
//! # Example
//!
//! ```ignore
//! use hwcgov::resource::{enumerate, Registry};
//!
//! let registry = Registry::with_builtins()?;
//! let alarms = registry.resource("huaweicloud.alarm")?;
//! let records = enumerate(&alarms.descriptor, &client, &options).await?;
//! ```

pub mod descriptor;
pub mod enumerator;
pub mod record;
pub mod registry;

pub use descriptor::{builtin_descriptors, Pagination, ResourceDescriptor};
pub use enumerator::{enumerate, ChildListing};
pub use record::Record;
pub use registry::{ActionFactory, FilterFactory, Registry, ResourceType};

use crate::config::RunOptions;
use crate::provider::ProviderClient;

/// What filters and actions get to see while a policy runs
#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    pub client: &'a dyn ProviderClient,
    pub descriptor: &'a ResourceDescriptor,
    pub options: RunOptions,
}

impl std::fmt::Debug for RunContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("resource", &self.descriptor.key)
            .field("options", &self.options)
            .finish()
    }
}
