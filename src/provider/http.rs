//! HTTP utilities for Huawei Cloud REST API calls

use crate::error::ProviderError;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Header carrying the IAM token
const AUTH_HEADER: &str = "X-Auth-Token";

/// Header carrying the provider-assigned request id
const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}

/// HTTP client wrapper for provider API calls
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(concat!("hwcgov/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Connection(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Make a GET request
    pub async fn get(
        &self,
        url: &str,
        token: &str,
        query: &[(String, String)],
    ) -> Result<Value, ProviderError> {
        self.send(Method::GET, url, token, query, None).await
    }

    /// Make a POST request
    pub async fn post(
        &self,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<Value, ProviderError> {
        self.send(Method::POST, url, token, &[], body).await
    }

    /// Make a PUT request
    pub async fn put(
        &self,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<Value, ProviderError> {
        self.send(Method::PUT, url, token, &[], body).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str, token: &str) -> Result<Value, ProviderError> {
        self.send(Method::DELETE, url, token, &[], None).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        token: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, ProviderError> {
        tracing::debug!("{} {}", method, url);

        let mut request = self.client.request(method, url).header(AUTH_HEADER, token);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        let status = response.status();
        let request_id = request_id_from(response.headers());
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Connection(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            // Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!(
                "API error: {} request_id={:?} - {}",
                status,
                request_id,
                sanitize_for_log(&text)
            );
            return Err(error_from_response(status, &text, request_id));
        }

        // Handle empty response
        if text.trim().is_empty() {
            return Ok(match request_id {
                Some(id) => serde_json::json!({ "request_id": id }),
                None => Value::Null,
            });
        }

        let mut value: Value = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Decode(format!("failed to parse response JSON: {e}")))?;

        if let (Value::Object(map), Some(id)) = (&mut value, request_id) {
            map.entry("request_id").or_insert(Value::String(id));
        }

        Ok(value)
    }
}

fn request_id_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Build a [`ProviderError`] from a failed response.
///
/// Huawei Cloud services report errors either as
/// `{"error_code": "..", "error_msg": ".."}` or `{"error": {"code": "..", "message": ".."}}`.
fn error_from_response(status: StatusCode, body: &str, request_id: Option<String>) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ProviderError::Throttled { request_id };
    }

    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let nested = parsed.get("error");

    let code = parsed
        .get("error_code")
        .or_else(|| nested.and_then(|e| e.get("code")))
        .and_then(|v| v.as_str())
        .unwrap_or("-")
        .to_string();
    let message = parsed
        .get("error_msg")
        .or_else(|| nested.and_then(|e| e.get("message")))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
    let request_id = request_id.or_else(|| {
        parsed
            .get("request_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    });

    ProviderError::Api {
        status: status.as_u16(),
        code,
        message,
        request_id,
    }
}
