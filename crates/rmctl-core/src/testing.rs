//! Scripted transport for exercising pollers without a network
//!
//! Responses are queued per call kind and handed out in FIFO order. Every
//! call is recorded together with the (tokio) instant it happened, so tests
//! running on a paused clock can assert on simulated wait times.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::time::Instant;

use crate::operation::OperationReference;
use crate::transport::{
    OperationRequest, ResourceResponse, StartResponse, StatusResponse, Transport, TransportError,
};

/// A call observed by [`ScriptedTransport`]
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Start(OperationRequest),
    GetStatus(String),
    GetResource(String),
}

#[derive(Default)]
struct Script {
    starts: VecDeque<Result<StartResponse, TransportError>>,
    statuses: VecDeque<Result<StatusResponse, TransportError>>,
    resources: VecDeque<Result<ResourceResponse, TransportError>>,
    calls: Vec<(RecordedCall, Instant)>,
}

/// Transport that replays queued responses
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_start(&self, response: Result<StartResponse, TransportError>) {
        self.lock().starts.push_back(response);
    }

    pub fn push_status(&self, response: Result<StatusResponse, TransportError>) {
        self.lock().statuses.push_back(response);
    }

    pub fn push_resource(&self, response: Result<ResourceResponse, TransportError>) {
        self.lock().resources.push_back(response);
    }

    /// Every call in the order it was made
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.iter().map(|(call, _)| call.clone()).collect()
    }

    pub fn status_queries(&self) -> usize {
        self.count(|call| matches!(call, RecordedCall::GetStatus(_)))
    }

    pub fn resource_fetches(&self) -> usize {
        self.count(|call| matches!(call, RecordedCall::GetResource(_)))
    }

    /// Instants at which status queries were issued
    pub fn status_query_times(&self) -> Vec<Instant> {
        self.lock()
            .calls
            .iter()
            .filter(|(call, _)| matches!(call, RecordedCall::GetStatus(_)))
            .map(|(_, at)| *at)
            .collect()
    }

    fn count(&self, predicate: impl Fn(&RecordedCall) -> bool) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(call, _)| predicate(call))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        // A test that panicked mid-call must not hide the original failure
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: RecordedCall) {
        self.lock().calls.push((call, Instant::now()));
    }
}

fn exhausted(kind: &str) -> TransportError {
    TransportError::network(format!("scripted transport has no {kind} response queued"))
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn start_operation(
        &self,
        request: &OperationRequest,
    ) -> Result<StartResponse, TransportError> {
        self.record(RecordedCall::Start(request.clone()));
        self.lock()
            .starts
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("start")))
    }

    async fn get_operation_status(
        &self,
        reference: &OperationReference,
    ) -> Result<StatusResponse, TransportError> {
        self.record(RecordedCall::GetStatus(reference.to_string()));
        self.lock()
            .statuses
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("status")))
    }

    async fn get_resource(&self, resource_id: &str) -> Result<ResourceResponse, TransportError> {
        self.record(RecordedCall::GetResource(resource_id.to_string()));
        self.lock()
            .resources
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("resource")))
    }
}
