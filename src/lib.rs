//! Huawei Cloud resource adapters for governance policies.
//!
//! Resource types are described by embedded descriptors and enumerated
//! through a [`provider::ProviderClient`]; [`filters`] narrow the records and
//! [`actions`] act on what is left. [`policy`] ties the three together.

pub mod actions;
pub mod config;
pub mod error;
pub mod filters;
pub mod policy;
pub mod provider;
pub mod resource;

pub use error::{Error, ProviderError, Result};

/// Version injected at compile time via HWCGOV_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("HWCGOV_VERSION") {
    Some(v) => v,
    None => "dev",
};
