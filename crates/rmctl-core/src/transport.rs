//! Transport seam between the poller and the control plane
//!
//! The poller only ever needs three calls: start an operation, query its
//! status, and fetch a resource. Anything that can answer those (an HTTP
//! client, a recorded session, a scripted fake) can drive a [`Poller`].
//!
//! [`Poller`]: crate::poller::Poller

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::operation::{ErrorPayload, OperationReference, OperationState};

/// HTTP-layer failure, distinct from an authoritative operation verdict
///
/// Transports retry transient failures themselves; once one of these reaches
/// the poller it is propagated unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// HTTP status code, or `None` for connection-level failures
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Failure below HTTP (DNS, connect, reset)
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }

    pub fn is_forbidden(&self) -> bool {
        self.status == Some(403)
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self.status, Some(500..=599))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.status, Some(408) | Some(504))
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == Some(429)
    }

    pub fn is_retryable(&self) -> bool {
        self.status.is_none() || self.is_server_error() || self.is_rate_limited() || self.is_timeout()
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for TransportError {}

/// HTTP method of a mutating request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Put,
    Post,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Put => write!(f, "PUT"),
            Method::Post => write!(f, "POST"),
            Method::Patch => write!(f, "PATCH"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

/// Description of a mutating request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub method: Method,
    /// Resource id or path, relative to the transport's endpoint
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl OperationRequest {
    pub fn new(method: Method, target: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            target: target.into(),
            body,
        }
    }

    pub fn put(target: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, target, Some(body))
    }

    pub fn post(target: impl Into<String>, body: Option<Value>) -> Self {
        Self::new(Method::Post, target, body)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::Delete, target, None)
    }
}

/// Response to the initial mutating call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartResponse {
    pub status_code: u16,
    pub body: Option<Value>,
    /// Present when the server accepted the request for asynchronous execution
    pub operation_reference: Option<OperationReference>,
    /// Where the final result can be fetched once the operation succeeds,
    /// when the server names one apart from the status monitor
    pub final_location: Option<String>,
    pub retry_after: Option<Duration>,
}

/// Response to a status query
#[derive(Debug, Clone, PartialEq)]
pub struct StatusResponse {
    pub state: OperationState,
    pub retry_after: Option<Duration>,
    pub resource_body: Option<Value>,
    pub error: Option<ErrorPayload>,
}

impl StatusResponse {
    pub fn in_progress(retry_after: Option<Duration>) -> Self {
        Self {
            state: OperationState::InProgress,
            retry_after,
            resource_body: None,
            error: None,
        }
    }

    pub fn succeeded(resource_body: Option<Value>) -> Self {
        Self {
            state: OperationState::Succeeded,
            retry_after: None,
            resource_body,
            error: None,
        }
    }

    pub fn failed(error: ErrorPayload) -> Self {
        Self {
            state: OperationState::Failed,
            retry_after: None,
            resource_body: None,
            error: Some(error),
        }
    }

    pub fn canceled(error: Option<ErrorPayload>) -> Self {
        Self {
            state: OperationState::Canceled,
            retry_after: None,
            resource_body: None,
            error,
        }
    }
}

/// Response to a resource fetch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceResponse {
    pub status_code: u16,
    pub body: Option<Value>,
}

/// The three calls the poller needs from the control plane
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute the initial mutating call
    async fn start_operation(
        &self,
        request: &OperationRequest,
    ) -> Result<StartResponse, TransportError>;

    /// Query the state of a pending operation
    async fn get_operation_status(
        &self,
        reference: &OperationReference,
    ) -> Result<StatusResponse, TransportError>;

    /// Fetch a resource by id
    async fn get_resource(&self, resource_id: &str) -> Result<ResourceResponse, TransportError>;
}
