//! Resource Enumerator
//!
//! Turns a [`ResourceDescriptor`] and a provider client into a flat list of
//! records, following the descriptor's pagination style.

use super::descriptor::{Pagination, ResourceDescriptor};
use super::record::{scalar_to_string, type_name, Record};
use crate::config::RunOptions;
use crate::error::{Error, Result};
use crate::provider::{ProviderClient, ProviderRequest};
use serde_json::Value;
use std::time::Duration;

/// Position of the next page to request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    Start,
    Offset(u64),
    Marker(String),
}

/// Result of a single page fetch
#[derive(Debug)]
pub struct PageResult {
    pub items: Vec<Record>,
    pub next: Option<Cursor>,
}

/// Fetch all records of a resource type (auto-paginate)
pub async fn enumerate(
    descriptor: &ResourceDescriptor,
    client: &dyn ProviderClient,
    options: &RunOptions,
) -> Result<Vec<Record>> {
    let mut all_items = Vec::new();
    let mut cursor = Cursor::Start;
    let mut pages = 0usize;

    loop {
        let page = fetch_page(descriptor, client, options, &cursor).await?;
        pages += 1;
        all_items.extend(page.items);

        match page.next {
            Some(next) => cursor = next,
            None => break,
        }
    }

    tracing::info!(
        "enumerated {} {} record(s) in {} page(s)",
        all_items.len(),
        descriptor.key,
        pages
    );

    Ok(all_items)
}

/// Fetch one page of records
pub async fn fetch_page(
    descriptor: &ResourceDescriptor,
    client: &dyn ProviderClient,
    options: &RunOptions,
    cursor: &Cursor,
) -> Result<PageResult> {
    let mut request = ProviderRequest::new(&descriptor.service, &descriptor.list_operation);
    request.params = descriptor.list_params.clone();

    match (&descriptor.pagination, cursor) {
        (Pagination::None, _) => {},
        (Pagination::Offset { start }, Cursor::Start) => {
            request = request
                .param("limit", options.page_limit)
                .param("offset", *start);
        },
        (Pagination::Offset { .. }, Cursor::Offset(offset)) => {
            request = request
                .param("limit", options.page_limit)
                .param("offset", *offset);
        },
        (Pagination::Marker { .. }, Cursor::Marker(marker)) => {
            request = request
                .param("limit", options.page_limit)
                .param("marker", marker.as_str());
        },
        (Pagination::Marker { .. }, _) => {
            request = request.param("limit", options.page_limit);
        },
        (Pagination::Offset { .. }, Cursor::Marker(_)) => {
            return Err(Error::config(format!(
                "resource '{}' uses offset pagination but got a marker cursor",
                descriptor.key
            )));
        },
    }

    let response = client.call(&request).await.map_err(|e| {
        tracing::error!(
            "listing {} via {}.{} failed: {}",
            descriptor.key,
            descriptor.service,
            descriptor.list_operation,
            e
        );
        Error::from(e)
    })?;

    let raw_items = extract_items(&response, &descriptor.response_path).ok_or_else(|| {
        Error::config(format!(
            "response of {}.{} has no array at '{}'",
            descriptor.service, descriptor.list_operation, descriptor.response_path
        ))
    })?;

    let fetched = raw_items.len();
    let items = raw_items
        .into_iter()
        .map(|item| normalize_record(item, descriptor))
        .collect::<Result<Vec<_>>>()?;

    let next = if fetched == 0 {
        None
    } else {
        match (&descriptor.pagination, cursor) {
            (Pagination::None, _) => None,
            (Pagination::Offset { start }, Cursor::Start) => Some(Cursor::Offset(start + fetched as u64)),
            (Pagination::Offset { .. }, Cursor::Offset(offset)) => {
                Some(Cursor::Offset(offset + fetched as u64))
            },
            (Pagination::Offset { .. }, Cursor::Marker(_)) => None,
            (Pagination::Marker { next_marker_path }, _) => {
                next_marker(&response, next_marker_path).map(Cursor::Marker)
            },
        }
    };

    tracing::debug!(
        "{}: page at {:?} returned {} item(s), next={:?}",
        descriptor.key,
        cursor,
        fetched,
        next
    );

    Ok(PageResult { items, next })
}

/// Extract the record array at a dotted path; `None` when the path is absent
/// or does not hold an array
fn extract_items(response: &Value, path: &str) -> Option<Vec<Value>> {
    let mut current = response;
    for part in path.split('.').filter(|p| !p.is_empty()) {
        current = current.get(part)?;
    }
    current.as_array().cloned()
}

fn next_marker(response: &Value, path: &str) -> Option<String> {
    let mut current = response;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    scalar_to_string(current).filter(|m| !m.is_empty())
}

/// Copy the descriptor's id field to `id` and stamp the tag resource type
fn normalize_record(item: Value, descriptor: &ResourceDescriptor) -> Result<Record> {
    let kind = type_name(&item);
    let mut record = Record::from_value(item).map_err(|_| {
        Error::data(format!(
            "{} listing returned a {} instead of an object",
            descriptor.key, kind
        ))
    })?;

    let id = record
        .get(&descriptor.id_field)
        .cloned()
        .filter(|v| !v.is_null())
        .ok_or_else(|| {
            Error::data(format!(
                "{} record has no id field '{}'",
                descriptor.key, descriptor.id_field
            ))
        })?;

    if descriptor.id_field != "id" {
        record.insert("id", id);
    }
    if let Some(tag_type) = &descriptor.tag_resource_type {
        record.insert("tag_resource_type", tag_type.as_str());
    }

    Ok(record)
}

/// One secondary listing call per parent record.
///
/// Parents whose `exclude_field` starts with `exclude_prefix` are skipped, and
/// `delay` is waited between successive calls. The first failing call aborts
/// the whole listing.
#[derive(Debug, Clone)]
pub struct ChildListing {
    pub service: String,
    pub operation: String,
    /// Field of the parent record passed as the request parameter
    pub parent_key: String,
    /// Request parameter name carrying the parent key
    pub param: String,
    /// Dotted path to the child array in the response
    pub response_path: String,
    pub exclude: Option<(String, String)>,
    pub delay: Duration,
}

impl ChildListing {
    pub fn new(service: &str, operation: &str, parent_key: &str, response_path: &str) -> Self {
        Self {
            service: service.to_string(),
            operation: operation.to_string(),
            parent_key: parent_key.to_string(),
            param: parent_key.to_string(),
            response_path: response_path.to_string(),
            exclude: None,
            delay: Duration::ZERO,
        }
    }

    /// Skip parents whose `field` starts with `prefix`
    #[must_use]
    pub fn excluding(mut self, field: &str, prefix: &str) -> Self {
        self.exclude = Some((field.to_string(), prefix.to_string()));
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn is_excluded(&self, parent: &Record) -> bool {
        match &self.exclude {
            Some((field, prefix)) => parent
                .get(field)
                .and_then(|v| v.as_str())
                .map(|v| v.starts_with(prefix.as_str()))
                .unwrap_or(false),
            None => false,
        }
    }

    /// List children of every non-excluded parent, paired with their parent
    pub async fn list<'p>(
        &self,
        parents: &'p [Record],
        client: &dyn ProviderClient,
    ) -> Result<Vec<(&'p Record, Vec<Record>)>> {
        let mut results = Vec::new();
        let mut issued = 0usize;

        for parent in parents {
            if self.is_excluded(parent) {
                tracing::debug!("skipping excluded parent {}", parent.display_id());
                continue;
            }

            let key = parent.require_str(&self.parent_key)?;

            if issued > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            issued += 1;

            let request = ProviderRequest::new(&self.service, &self.operation).param(&self.param, key);
            let response = client.call(&request).await.map_err(|e| {
                tracing::error!(
                    "secondary listing {}.{} for {} failed: {}",
                    self.service,
                    self.operation,
                    key,
                    e
                );
                Error::from(e)
            })?;

            let children = extract_items(&response, &self.response_path)
                .ok_or_else(|| {
                    Error::config(format!(
                        "response of {}.{} has no array at '{}'",
                        self.service, self.operation, self.response_path
                    ))
                })?
                .into_iter()
                .map(|item| {
                    let kind = type_name(&item);
                    Record::from_value(item).map_err(|_| {
                        Error::data(format!(
                            "{}.{} for {} returned a {} instead of an object",
                            self.service, self.operation, key, kind
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            results.push((parent, children));
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses in order and records each request
    struct Scripted {
        responses: Mutex<VecDeque<std::result::Result<Value, ProviderError>>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl Scripted {
        fn new(responses: Vec<std::result::Result<Value, ProviderError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<ProviderRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProviderClient for Scripted {
        async fn call(&self, request: &ProviderRequest) -> std::result::Result<Value, ProviderError> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(json!({"metric_alarms": []})))
        }
    }

    fn alarms(ids: &[&str]) -> Value {
        json!({
            "metric_alarms": ids.iter().map(|id| json!({"alarm_id": id})).collect::<Vec<_>>()
        })
    }

    fn alarm_descriptor() -> ResourceDescriptor {
        ResourceDescriptor::new("alarm", "ces", "list_alarms", "metric_alarms", "alarm_id")
            .with_pagination(Pagination::Offset { start: 0 })
    }

    fn options() -> RunOptions {
        RunOptions {
            page_limit: 2,
            ..RunOptions::default().without_delays()
        }
    }

    #[tokio::test]
    async fn test_offset_pagination_concatenates_in_order() {
        let client = Scripted::new(vec![
            Ok(alarms(&["a1", "a2"])),
            Ok(alarms(&["a3", "a4"])),
            Ok(alarms(&["a5"])),
            Ok(alarms(&[])),
        ]);

        let records = enumerate(&alarm_descriptor(), &client, &options()).await.unwrap();

        let ids: Vec<_> = records.iter().map(|r| r.id().unwrap()).collect();
        assert_eq!(ids, vec!["a1", "a2", "a3", "a4", "a5"]);

        let offsets: Vec<_> = client
            .requests()
            .iter()
            .map(|r| r.params["offset"].as_u64().unwrap())
            .collect();
        assert_eq!(offsets, vec![0, 2, 4, 5]);
    }

    #[tokio::test]
    async fn test_offset_start_is_honoured() {
        let descriptor = ResourceDescriptor::new("coc", "coc", "list_instance_compliant", "instance_compliant", "id")
            .with_pagination(Pagination::Offset { start: 1 });
        let client = Scripted::new(vec![
            Ok(json!({"instance_compliant": [{"id": "c1"}]})),
            Ok(json!({"instance_compliant": []})),
        ]);

        let records = enumerate(&descriptor, &client, &options()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(client.requests()[0].params["offset"], 1);
        assert_eq!(client.requests()[1].params["offset"], 2);
    }

    #[tokio::test]
    async fn test_marker_pagination_stops_without_marker() {
        let descriptor = ResourceDescriptor::new("x", "svc", "list_x", "items", "id").with_pagination(
            Pagination::Marker {
                next_marker_path: "page_info.next_marker".to_string(),
            },
        );
        let client = Scripted::new(vec![
            Ok(json!({"items": [{"id": "1"}], "page_info": {"next_marker": "m-1"}})),
            Ok(json!({"items": [{"id": "2"}], "page_info": {}})),
        ]);

        let records = enumerate(&descriptor, &client, &options()).await.unwrap();
        assert_eq!(records.len(), 2);

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].params.get("marker").is_none());
        assert_eq!(requests[1].get_str("marker"), Some("m-1"));
    }

    #[tokio::test]
    async fn test_unpaginated_makes_one_call() {
        let descriptor = ResourceDescriptor::new("g", "lts", "list_log_groups", "log_groups", "log_group_id");
        let client = Scripted::new(vec![Ok(json!({"log_groups": [
            {"log_group_id": "g1"}, {"log_group_id": "g2"}
        ]}))]);

        let records = enumerate(&descriptor, &client, &options()).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(client.requests().len(), 1);
        assert!(client.requests()[0].params.get("limit").is_none());
        assert_eq!(records[0].get("id"), Some(&json!("g1")));
    }

    #[tokio::test]
    async fn test_tag_resource_type_is_stamped() {
        let mut descriptor = alarm_descriptor();
        descriptor.tag_resource_type = Some("ces-alarm".to_string());
        let client = Scripted::new(vec![Ok(alarms(&["a1"])), Ok(alarms(&[]))]);

        let records = enumerate(&descriptor, &client, &options()).await.unwrap();
        assert_eq!(records[0].get("tag_resource_type"), Some(&json!("ces-alarm")));
    }

    #[tokio::test]
    async fn test_missing_response_field_is_config_error() {
        let client = Scripted::new(vec![Ok(json!({"alarms": []}))]);
        let err = enumerate(&alarm_descriptor(), &client, &options()).await.unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_missing_id_is_data_error() {
        let client = Scripted::new(vec![Ok(json!({"metric_alarms": [{"name": "no-id"}]}))]);
        let err = enumerate(&alarm_descriptor(), &client, &options()).await.unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }

    #[tokio::test]
    async fn test_provider_error_aborts_enumeration() {
        let client = Scripted::new(vec![
            Ok(alarms(&["a1", "a2"])),
            Err(ProviderError::Connection("reset".into())),
        ]);
        let err = enumerate(&alarm_descriptor(), &client, &options()).await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::Connection(_))));
    }

    #[tokio::test]
    async fn test_child_listing_skips_excluded_parents() {
        let parents = vec![
            Record::from_value(json!({"log_group_id": "g1", "log_group_name": "functiongraph.log.group.x"})).unwrap(),
            Record::from_value(json!({"log_group_id": "g2", "log_group_name": "app"})).unwrap(),
        ];
        let client = Scripted::new(vec![Ok(json!({"log_streams": [{"log_stream_id": "s1"}]}))]);

        let listing = ChildListing::new("lts", "list_log_stream", "log_group_id", "log_streams")
            .excluding("log_group_name", "functiongraph.log.group");
        let results = listing.list(&parents, &client).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.get("log_group_id"), Some(&json!("g2")));
        assert_eq!(results[0].1.len(), 1);
        assert_eq!(client.requests()[0].get_str("log_group_id"), Some("g2"));
    }

    #[tokio::test]
    async fn test_child_listing_failure_returns_no_partial_results() {
        let parents = vec![
            Record::from_value(json!({"log_group_id": "g1"})).unwrap(),
            Record::from_value(json!({"log_group_id": "g2"})).unwrap(),
        ];
        let client = Scripted::new(vec![
            Ok(json!({"log_streams": [{"log_stream_id": "s1"}]})),
            Err(ProviderError::Throttled { request_id: None }),
        ]);

        let listing = ChildListing::new("lts", "list_log_stream", "log_group_id", "log_streams");
        let err = listing.list(&parents, &client).await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::Throttled { .. })));
    }

    #[tokio::test]
    async fn test_child_listing_without_array_is_config_error() {
        let parents = vec![Record::from_value(json!({"log_group_id": "g1"})).unwrap()];
        let client = Scripted::new(vec![Ok(json!({
            "streams": [{"log_stream_id": "s1", "whether_log_storage": true}]
        }))]);

        let listing = ChildListing::new("lts", "list_log_stream", "log_group_id", "log_streams");
        let err = listing.list(&parents, &client).await.unwrap_err();
        assert!(err.is_config(), "got {err}");
    }

    #[tokio::test]
    async fn test_child_listing_rejects_non_object_children() {
        let parents = vec![Record::from_value(json!({"log_group_id": "g1"})).unwrap()];
        let client = Scripted::new(vec![Ok(json!({"log_streams": [{"log_stream_id": "s1"}, "s2"]}))]);

        let listing = ChildListing::new("lts", "list_log_stream", "log_group_id", "log_streams");
        let err = listing.list(&parents, &client).await.unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_listing_waits_between_calls() {
        let parents: Vec<_> = (0..3)
            .map(|i| Record::from_value(json!({"log_group_id": format!("g{i}")})).unwrap())
            .collect();
        let client = Scripted::new(vec![
            Ok(json!({"log_streams": []})),
            Ok(json!({"log_streams": []})),
            Ok(json!({"log_streams": []})),
        ]);

        let listing = ChildListing::new("lts", "list_log_stream", "log_group_id", "log_streams")
            .with_delay(Duration::from_millis(220));
        let started = tokio::time::Instant::now();
        listing.list(&parents, &client).await.unwrap();

        // two pauses for three calls
        assert!(started.elapsed() >= Duration::from_millis(440));
        assert!(started.elapsed() < Duration::from_millis(660));
    }
}
