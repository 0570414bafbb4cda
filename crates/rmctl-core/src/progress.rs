//! Progress events emitted while waiting on long-running operations
//!
//! The CLI turns these into spinner updates; library callers usually leave
//! the callback unset and rely on `tracing` output instead.

use std::time::Duration;

use crate::operation::{OperationReference, OperationState};

/// Progress events emitted during a wait
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Waiting started (or resumed) for a pending operation
    Started { reference: OperationReference },
    /// A status query returned
    Polling {
        reference: OperationReference,
        state: OperationState,
        attempt: u32,
        elapsed: Duration,
    },
    /// Operation completed successfully
    Completed { reference: OperationReference },
    /// Operation ended in failure or cancellation
    Failed {
        reference: OperationReference,
        error: String,
    },
}

/// Callback type for progress updates
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Helper to emit progress events
pub(crate) fn emit(callback: &Option<ProgressCallback>, event: ProgressEvent) {
    if let Some(cb) = callback {
        cb(event);
    }
}
