//! In-memory control plane for tests.
//!
//! Scripted, deterministic stand-in for the HTTP client: responses and
//! status snapshots are queued ahead of time and every call is recorded,
//! so tests can assert on exact call order and parameter bags.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use stratus_api::{ApiError, ControlPlane};
use stratus_core::{ContractStatus, ResourceId, ResourceStatus, StatusPair};

#[derive(Debug, Default)]
struct Inner {
    current: Option<StatusPair>,
    per_id: HashMap<String, StatusPair>,
    scripted: VecDeque<StatusPair>,
    responses: HashMap<String, VecDeque<Value>>,
    transitions: HashMap<String, StatusPair>,
    fail_ops: HashMap<String, (String, String)>,
    fail_status: Option<(String, String)>,
    calls: Vec<(String, Value)>,
    status_queries: usize,
}

/// A scriptable [`ControlPlane`] that records every call.
///
/// `get_status` serves scripted snapshots first and then the standing
/// status. `invoke` serves queued responses per operation (an empty bag
/// otherwise); a `VMPower` call flips the standing status to the
/// requested power state, and operations registered with
/// [`MockControlPlane::transition_on`] replace the standing status when
/// invoked.
#[derive(Debug, Default)]
pub struct MockControlPlane {
    inner: Mutex<Inner>,
}

impl MockControlPlane {
    /// A mock whose standing status is `current`.
    #[must_use]
    pub fn new(current: StatusPair) -> Self {
        let mock = Self::default();
        mock.inner.lock().current = Some(current);
        mock
    }

    /// Replace the standing status.
    pub fn set_status(&self, pair: StatusPair) {
        self.inner.lock().current = Some(pair);
    }

    /// Give one resource its own standing status, overriding the shared
    /// one.
    pub fn set_status_for(&self, id: &str, pair: StatusPair) {
        self.inner.lock().per_id.insert(id.to_owned(), pair);
    }

    /// Queue status snapshots served before the standing status.
    pub fn script_statuses(&self, pairs: Vec<StatusPair>) {
        self.inner.lock().scripted.extend(pairs);
    }

    /// Queue a response body for one invocation of `operation`.
    pub fn queue_response(&self, operation: &str, body: Value) {
        self.inner
            .lock()
            .responses
            .entry(operation.to_owned())
            .or_default()
            .push_back(body);
    }

    /// Make the standing status become `pair` whenever `operation` is
    /// invoked.
    pub fn transition_on(&self, operation: &str, pair: StatusPair) {
        self.inner.lock().transitions.insert(operation.to_owned(), pair);
    }

    /// Make every invocation of `operation` fail with a vendor error.
    pub fn fail_operation(&self, operation: &str, code: &str, message: &str) {
        self.inner
            .lock()
            .fail_ops
            .insert(operation.to_owned(), (code.to_owned(), message.to_owned()));
    }

    /// Make every status query fail with a vendor error.
    pub fn fail_status(&self, code: &str, message: &str) {
        self.inner.lock().fail_status = Some((code.to_owned(), message.to_owned()));
    }

    /// Every recorded call, in invocation order.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.inner.lock().calls.clone()
    }

    /// Operation names of every recorded call, in invocation order.
    #[must_use]
    pub fn call_sequence(&self) -> Vec<String> {
        self.inner.lock().calls.iter().map(|(op, _)| op.clone()).collect()
    }

    /// Parameter bags of every recorded call to `operation`.
    #[must_use]
    pub fn calls_for(&self, operation: &str) -> Vec<Value> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|(op, _)| op == operation)
            .map(|(_, params)| params.clone())
            .collect()
    }

    /// How many status queries have been served.
    #[must_use]
    pub fn status_queries(&self) -> usize {
        self.inner.lock().status_queries
    }

    /// Forget the call log and every scripted behavior, keeping only the
    /// standing status.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.per_id.clear();
        inner.scripted.clear();
        inner.responses.clear();
        inner.transitions.clear();
        inner.fail_ops.clear();
        inner.fail_status = None;
        inner.calls.clear();
        inner.status_queries = 0;
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn invoke(&self, operation: &str, params: Value) -> stratus_api::Result<Value> {
        let mut inner = self.inner.lock();
        inner.calls.push((operation.to_owned(), params.clone()));

        if let Some((code, message)) = inner.fail_ops.get(operation) {
            return Err(ApiError::Api {
                operation: operation.to_owned(),
                code: code.clone(),
                message: message.clone(),
            });
        }

        if operation == "VMPower" {
            let resource = if params["power"] == "On" {
                ResourceStatus::Running
            } else {
                ResourceStatus::Stopped
            };
            let pair = StatusPair::new(ContractStatus::InService, resource);
            let server = params["ivm_service_code"].as_str().unwrap_or_default();
            if inner.per_id.contains_key(server) {
                inner.per_id.insert(server.to_owned(), pair);
            } else {
                inner.current = Some(pair);
            }
        } else if let Some(pair) = inner.transitions.get(operation) {
            inner.current = Some(*pair);
        }

        let body = inner
            .responses
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| json!({}));
        Ok(body)
    }

    async fn get_status(&self, id: &ResourceId) -> stratus_api::Result<StatusPair> {
        let mut inner = self.inner.lock();
        inner.status_queries += 1;

        if let Some((code, message)) = &inner.fail_status {
            return Err(ApiError::Api {
                operation: id.kind().status_operation().to_owned(),
                code: code.clone(),
                message: message.clone(),
            });
        }

        if let Some(pair) = inner.scripted.pop_front() {
            return Ok(pair);
        }
        if let Some(pair) = inner.per_id.get(id.as_str()) {
            return Ok(*pair);
        }
        inner.current.ok_or_else(|| ApiError::Decode {
            operation: id.kind().status_operation().to_owned(),
            message: "no status scripted".to_owned(),
        })
    }
}
