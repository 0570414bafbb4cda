//! Operation handle types shared by the poller and the transport seam

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Opaque server-issued token (URL or id) identifying a pending operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationReference(String);

impl OperationReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structured error reported by the control plane
///
/// Follows the usual management-plane envelope: a machine-readable `code`, a
/// human message, an optional `target`, and nested `details`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    /// HTTP status of the response that carried this payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorPayload>,
}

impl ErrorPayload {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status: None,
            target: None,
            details: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code.is_empty(), self.message.is_empty()) {
            (false, false) => write!(f, "{}: {}", self.code, self.message)?,
            (false, true) => write!(f, "{}", self.code)?,
            (true, _) => write!(f, "{}", self.message)?,
        }
        if let Some(status) = self.status {
            write!(f, " (HTTP {})", status)?;
        }
        Ok(())
    }
}

/// Raw operation state as reported by a status query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    InProgress,
    Succeeded,
    Failed,
    Canceled,
}

impl OperationState {
    /// Map a service status string to a state (case-insensitive)
    ///
    /// Anything that is not a recognized terminal state is still in progress:
    /// services report `Accepted`, `Running`, `Creating`, `Deleting` and more.
    pub fn from_status(status: &str) -> Self {
        match status.to_lowercase().as_str() {
            "succeeded" | "success" | "completed" => OperationState::Succeeded,
            "failed" | "error" => OperationState::Failed,
            "canceled" | "cancelled" => OperationState::Canceled,
            _ => OperationState::InProgress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationState::InProgress)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationState::InProgress => write!(f, "InProgress"),
            OperationState::Succeeded => write!(f, "Succeeded"),
            OperationState::Failed => write!(f, "Failed"),
            OperationState::Canceled => write!(f, "Canceled"),
        }
    }
}

/// Last status observed by a poller
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus<T> {
    /// Completed; carries the materialized resource
    Succeeded(T),
    Failed(ErrorPayload),
    Canceled(ErrorPayload),
    InProgress { retry_after: Option<Duration> },
}

impl<T> PollStatus<T> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollStatus::InProgress { .. })
    }

    pub fn state(&self) -> OperationState {
        match self {
            PollStatus::Succeeded(_) => OperationState::Succeeded,
            PollStatus::Failed(_) => OperationState::Failed,
            PollStatus::Canceled(_) => OperationState::Canceled,
            PollStatus::InProgress { .. } => OperationState::InProgress,
        }
    }
}

/// Outcome of starting an operation
#[derive(Debug, Clone, PartialEq)]
pub enum StartResult<T> {
    /// The server completed the request synchronously
    Immediate(T),
    /// The server accepted the request; poll `reference` after `initial_delay`
    Pending {
        reference: OperationReference,
        initial_delay: Duration,
    },
}

impl<T> StartResult<T> {
    pub fn reference(&self) -> Option<&OperationReference> {
        match self {
            StartResult::Immediate(_) => None,
            StartResult::Pending { reference, .. } => Some(reference),
        }
    }
}
