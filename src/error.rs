//! Error types
//!
//! Three kinds of failure cross this layer:
//!
//! - [`Error::Config`] - invalid or contradictory policy configuration. Raised
//!   while a policy is loaded, aborting it before any record is processed.
//! - [`Error::Provider`] - the provider API call failed (network, auth,
//!   throttling, not-found, ...).
//! - [`Error::Data`] - a response or record is missing an expected field.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for enumeration, filtering and actions
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid policy, filter, action or descriptor configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// The provider API call failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A record or response did not have the expected shape
    #[error("data error: {0}")]
    Data(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Failures reported by a provider client
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The service answered with a non-success status
    #[error("API request failed: {status} {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
        request_id: Option<String>,
    },

    /// The service rejected the request due to rate limiting (HTTP 429)
    #[error("API request throttled")]
    Throttled { request_id: Option<String> },

    /// The request never produced a response
    #[error("connection error: {0}")]
    Connection(String),

    /// The response body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// No REST mapping exists for the requested operation
    #[error("unknown operation {service}.{operation}")]
    UnknownOperation { service: String, operation: String },

    /// A request parameter needed to build the call is missing
    #[error("missing request parameter: {0}")]
    MissingParam(String),
}

impl ProviderError {
    /// Provider-assigned request id, when the service returned one
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Api { request_id, .. } | Self::Throttled { request_id } => request_id.as_deref(),
            _ => None,
        }
    }

    /// HTTP status code, when the failure came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Throttled { .. } => Some(429),
            _ => None,
        }
    }
}
