//! Unified error handling for rmctl-core
//!
//! Every failure a caller can observe while driving a long-running operation
//! is represented here, with helper methods mirroring the HTTP-level
//! classification of the underlying transport.
//!
//! # Example
//!
//! ```rust
//! use rmctl_core::{CoreError, TransportError};
//!
//! let err: CoreError = TransportError::new(404, "ResourceNotFound").into();
//! assert!(err.is_not_found());
//! assert!(!err.is_retryable());
//! ```

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;
use crate::operation::{ErrorPayload, OperationReference};
use crate::transport::TransportError;

/// Who asked for an operation to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOrigin {
    /// The control plane reported the operation as canceled
    Server,
    /// The caller's cancellation token fired while waiting
    Caller,
}

impl fmt::Display for CancelOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelOrigin::Server => write!(f, "server"),
            CancelOrigin::Caller => write!(f, "caller"),
        }
    }
}

/// A step of the shared-resource lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleStep {
    Create,
    Settle,
    GrantAccess,
    RevokeAccess,
    Delete,
}

impl fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleStep::Create => write!(f, "create"),
            LifecycleStep::Settle => write!(f, "settle"),
            LifecycleStep::GrantAccess => write!(f, "grant-access"),
            LifecycleStep::RevokeAccess => write!(f, "revoke-access"),
            LifecycleStep::Delete => write!(f, "delete"),
        }
    }
}

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    /// Network or HTTP-layer failure surfaced by the transport after its own retries
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authoritative failure verdict from the control plane
    #[error("Operation {reference} failed: {error}")]
    OperationFailed {
        reference: OperationReference,
        error: ErrorPayload,
    },

    /// Operation canceled by the server or by the waiting caller
    #[error("Operation canceled by {origin}")]
    OperationCanceled {
        reference: Option<OperationReference>,
        origin: CancelOrigin,
        error: Option<ErrorPayload>,
    },

    /// The caller's deadline would be exceeded before the next poll
    #[error("Timed out after {waited:?} waiting for completion")]
    Timeout {
        reference: Option<OperationReference>,
        waited: Duration,
    },

    /// Shared fixture could not be provisioned
    #[error("Provisioning '{resource}' failed during {step}: {source}")]
    ProvisioningFailed {
        resource: String,
        step: LifecycleStep,
        #[source]
        source: Box<CoreError>,
        /// Resources created before the failure that were not rolled back
        leaked: Vec<String>,
    },

    /// A response body did not match the expected resource shape
    #[error("Failed to decode resource: {0}")]
    Decode(#[from] serde_json::Error),

    /// Profile could not be turned into a working client
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Returns true if this is a "not found" error (404)
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            CoreError::Transport(e) => e.is_not_found(),
            CoreError::OperationFailed { error, .. } => error.status == Some(404),
            _ => false,
        }
    }

    /// Returns true if this is a "forbidden" error (403)
    ///
    /// Some services answer 403 instead of 404 for resources that do not exist.
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        match self {
            CoreError::Transport(e) => e.is_forbidden(),
            CoreError::OperationFailed { error, .. } => error.status == Some(403),
            _ => false,
        }
    }

    /// Returns true if this is a timeout error
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            CoreError::Transport(e) => e.is_timeout(),
            CoreError::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Returns true if the operation was canceled, by either side
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self, CoreError::OperationCanceled { .. })
    }

    /// Returns true if waiting again on the same poller can still succeed
    ///
    /// Deadlines, caller cancellation and transport failures leave the
    /// operation's outcome unknown; server verdicts do not.
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            CoreError::Transport(_)
                | CoreError::Timeout { .. }
                | CoreError::OperationCanceled {
                    origin: CancelOrigin::Caller,
                    ..
                }
        )
    }

    /// Returns true if this error is potentially retryable at a higher level
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Transport(e) => e.is_retryable(),
            CoreError::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Server-issued operation reference, when the error came from a poller
    pub fn reference(&self) -> Option<&OperationReference> {
        match self {
            CoreError::OperationFailed { reference, .. } => Some(reference),
            CoreError::OperationCanceled { reference, .. } | CoreError::Timeout { reference, .. } => {
                reference.as_ref()
            }
            _ => None,
        }
    }
}
