//! Provider API interaction module
//!
//! # Module Structure
//!
//! - [`client`] - the [`ProviderClient`] trait and the Huawei Cloud REST client
//! - [`dispatch`] - maps operation names to REST calls
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use hwcgov::provider::{HuaweiCloudClient, ProviderClient, ProviderRequest};
//!
//! async fn example(client: &HuaweiCloudClient) -> anyhow::Result<()> {
//!     let request = ProviderRequest::new("lts", "list_log_groups");
//!     let groups = client.call(&request).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod dispatch;
pub mod http;

pub use client::{HuaweiCloudClient, ProviderClient, ProviderRequest};
