//! Shared fake provider for integration tests

use async_trait::async_trait;
use hwcgov::error::ProviderError;
use hwcgov::provider::{ProviderClient, ProviderRequest};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

type Reply = Result<Value, ProviderError>;

/// Answers each `service.operation` from its own queue of replies.
///
/// An operation whose queue is empty answers with `fallback` when one is
/// set, otherwise with an empty object.
#[derive(Default)]
pub struct FakeCloud {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallback: Mutex<HashMap<String, Value>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

#[allow(dead_code)]
impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for an operation
    pub fn reply(self, operation: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(operation.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn ok(self, operation: &str, body: Value) -> Self {
        self.reply(operation, Ok(body))
    }

    /// Reply used once an operation's queue runs dry
    pub fn otherwise(self, operation: &str, body: Value) -> Self {
        self.fallback
            .lock()
            .unwrap()
            .insert(operation.to_string(), body);
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, operation: &str) -> Vec<ProviderRequest> {
        self.requests()
            .into_iter()
            .filter(|r| format!("{}.{}", r.service, r.operation) == operation)
            .collect()
    }
}

#[async_trait]
impl ProviderClient for FakeCloud {
    async fn call(&self, request: &ProviderRequest) -> Reply {
        self.requests.lock().unwrap().push(request.clone());

        let key = format!("{}.{}", request.service, request.operation);
        if let Some(reply) = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(|q| q.pop_front())
        {
            return reply;
        }

        Ok(self
            .fallback
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| json!({})))
    }
}
