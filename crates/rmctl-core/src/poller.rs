//! Long-running operation poller
//!
//! Mutating calls against the control plane return either the finished
//! resource or a reference to a pending operation. A [`Poller`] owns that
//! reference and drives it to a terminal state:
//!
//! ```rust,ignore
//! use rmctl_core::{OperationRequest, Poller, PollingConfig, WaitOptions};
//! use std::time::Duration;
//!
//! let mut poller: Poller<Snapshot> = Poller::start(
//!     transport.clone(),
//!     &PollingConfig::default(),
//!     &OperationRequest::put(id, body),
//!     Some(id.to_string()),
//! )
//! .await?;
//!
//! let snapshot = poller
//!     .wait_for_completion(&WaitOptions::new().with_timeout(Duration::from_secs(600)))
//!     .await?;
//! ```
//!
//! Terminal outcomes (Succeeded, Failed, Canceled) are cached: waiting again
//! returns the same result without touching the network. Timeouts, caller
//! cancellation and transport errors are not terminal, so a later wait resumes
//! polling from where the previous one stopped.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::config::PollingConfig;
use crate::error::{CancelOrigin, CoreError, Result};
use crate::operation::{ErrorPayload, OperationReference, OperationState, PollStatus, StartResult};
use crate::progress::{ProgressCallback, ProgressEvent, emit};
use crate::transport::{OperationRequest, StatusResponse, Transport};

/// Caller-side controls for a wait
#[derive(Default)]
pub struct WaitOptions {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
    on_progress: Option<ProgressCallback>,
}

impl WaitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absolute deadline for the wait
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Abort the wait when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressEvent) + Send + Sync + 'static,
    {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    pub(crate) fn emit(&self, event: ProgressEvent) {
        emit(&self.on_progress, event);
    }

    /// Suspend for `delay`, honoring the deadline and the cancellation token
    ///
    /// Fails with `Timeout` before sleeping when waking up would land past the
    /// deadline, and with `OperationCanceled` as soon as the token fires.
    pub async fn sleep(
        &self,
        delay: Duration,
        reference: Option<&OperationReference>,
        started: Instant,
    ) -> Result<()> {
        self.check_cancelled(reference)?;

        if let Some(deadline) = self.deadline
            && Instant::now() + delay > deadline
        {
            return Err(CoreError::Timeout {
                reference: reference.cloned(),
                waited: started.elapsed(),
            });
        }

        if delay.is_zero() {
            return Ok(());
        }

        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(canceled_by_caller(reference)),
                    _ = tokio::time::sleep(delay) => Ok(()),
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }

    pub(crate) fn check_cancelled(&self, reference: Option<&OperationReference>) -> Result<()> {
        if self.is_cancelled() {
            return Err(canceled_by_caller(reference));
        }
        Ok(())
    }
}

fn canceled_by_caller(reference: Option<&OperationReference>) -> CoreError {
    CoreError::OperationCanceled {
        reference: reference.cloned(),
        origin: CancelOrigin::Caller,
        error: None,
    }
}

/// Handle for a single long-running operation, generic over the resource it yields
pub struct Poller<T> {
    transport: Arc<dyn Transport>,
    start: StartResult<T>,
    /// Resource fetched when a Succeeded status carries no body
    resource_location: Option<String>,
    backoff: Backoff,
    next_delay: Duration,
    attempt: u32,
    last_status: Option<PollStatus<T>>,
    /// Body of a Succeeded status whose resource is not materialized yet
    succeeded_body: Option<Value>,
}

impl<T> Poller<T>
where
    T: DeserializeOwned + Clone,
{
    /// Issue the initial request and capture what is needed to poll it
    ///
    /// `resource_location` names the resource to fetch when the operation
    /// succeeds without returning a body. When `None`, a final-result URL
    /// reported by the server (if any) is used instead.
    pub async fn start(
        transport: Arc<dyn Transport>,
        polling: &PollingConfig,
        request: &OperationRequest,
        resource_location: Option<String>,
    ) -> Result<Self> {
        debug!(method = %request.method, target = %request.target, "Starting operation");
        let response = transport.start_operation(request).await?;
        let resource_location = resource_location.or(response.final_location);

        let start = match response.operation_reference {
            Some(reference) => {
                let initial_delay = response
                    .retry_after
                    .unwrap_or_else(|| polling.initial_delay());
                info!(
                    %reference,
                    status = response.status_code,
                    ?initial_delay,
                    "Operation accepted"
                );
                StartResult::Pending {
                    reference,
                    initial_delay,
                }
            }
            None => {
                debug!(status = response.status_code, "Operation completed synchronously");
                StartResult::Immediate(decode(response.body)?)
            }
        };

        Ok(Self::from_start(transport, polling, start, resource_location))
    }

    /// Build a poller around an existing start result
    pub fn from_start(
        transport: Arc<dyn Transport>,
        polling: &PollingConfig,
        start: StartResult<T>,
        resource_location: Option<String>,
    ) -> Self {
        let backoff = Backoff::new(polling);
        let next_delay = match &start {
            StartResult::Pending { initial_delay, .. } => backoff.floored(*initial_delay),
            StartResult::Immediate(_) => Duration::ZERO,
        };
        Self {
            transport,
            start,
            resource_location,
            backoff,
            next_delay,
            attempt: 0,
            last_status: None,
            succeeded_body: None,
        }
    }

    /// Resume polling an operation from a saved reference
    pub fn resume(
        transport: Arc<dyn Transport>,
        polling: &PollingConfig,
        reference: OperationReference,
        resource_location: Option<String>,
    ) -> Self {
        let start = StartResult::Pending {
            reference,
            initial_delay: Duration::ZERO,
        };
        Self::from_start(transport, polling, start, resource_location)
    }

    pub fn start_result(&self) -> &StartResult<T> {
        &self.start
    }

    pub fn reference(&self) -> Option<&OperationReference> {
        self.start.reference()
    }

    pub fn last_status(&self) -> Option<&PollStatus<T>> {
        self.last_status.as_ref()
    }

    /// Number of status queries issued so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// True once the operation completed or reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self.start, StartResult::Immediate(_))
            || self.succeeded_body.is_some()
            || self.last_status.as_ref().is_some_and(PollStatus::is_terminal)
    }

    /// Drive the operation to a terminal state
    pub async fn wait_for_completion(&mut self, options: &WaitOptions) -> Result<T> {
        let reference = match &self.start {
            StartResult::Immediate(resource) => return Ok(resource.clone()),
            StartResult::Pending { reference, .. } => reference.clone(),
        };

        if let Some(outcome) = self.terminal_outcome(&reference) {
            return outcome;
        }
        if self.succeeded_body.is_some() {
            debug!(%reference, "Retrying completion fetch");
            return self.finish_succeeded(&reference, options).await;
        }

        let started = Instant::now();
        options.emit(ProgressEvent::Started {
            reference: reference.clone(),
        });

        loop {
            options
                .sleep(self.next_delay, Some(&reference), started)
                .await
                .inspect_err(|e| debug!(%reference, error = %e, "Stopped waiting"))?;
            options.check_cancelled(Some(&reference))?;

            self.attempt += 1;
            let status = self.transport.get_operation_status(&reference).await?;
            debug!(
                %reference,
                attempt = self.attempt,
                state = %status.state,
                retry_after = ?status.retry_after,
                "Polled operation status"
            );
            options.emit(ProgressEvent::Polling {
                reference: reference.clone(),
                state: status.state,
                attempt: self.attempt,
                elapsed: started.elapsed(),
            });

            match status.state {
                OperationState::InProgress => {
                    self.next_delay = self.backoff.next_delay(status.retry_after);
                    self.last_status = Some(PollStatus::InProgress {
                        retry_after: status.retry_after,
                    });
                }
                OperationState::Succeeded => {
                    self.succeeded_body = Some(status.resource_body.unwrap_or(Value::Null));
                    return self.finish_succeeded(&reference, options).await;
                }
                OperationState::Failed => {
                    let error = failure_payload(&status, "Failed", "Operation failed");
                    warn!(%reference, error = %error, "Operation failed");
                    self.last_status = Some(PollStatus::Failed(error));
                    return self.finish_terminal(&reference, options);
                }
                OperationState::Canceled => {
                    let error = failure_payload(&status, "Canceled", "Operation was canceled");
                    warn!(%reference, "Operation canceled by server");
                    self.last_status = Some(PollStatus::Canceled(error));
                    return self.finish_terminal(&reference, options);
                }
            }
        }
    }

    /// Materialize a Succeeded verdict; on failure the verdict is kept so a
    /// later wait retries only the completion fetch
    async fn finish_succeeded(
        &mut self,
        reference: &OperationReference,
        options: &WaitOptions,
    ) -> Result<T> {
        let body = self.succeeded_body.clone();
        let resource = self.materialize(body).await?;
        info!(%reference, attempts = self.attempt, "Operation succeeded");
        self.succeeded_body = None;
        self.last_status = Some(PollStatus::Succeeded(resource.clone()));
        options.emit(ProgressEvent::Completed {
            reference: reference.clone(),
        });
        Ok(resource)
    }

    fn finish_terminal(&self, reference: &OperationReference, options: &WaitOptions) -> Result<T> {
        match self.terminal_outcome(reference) {
            Some(Err(e)) => {
                options.emit(ProgressEvent::Failed {
                    reference: reference.clone(),
                    error: e.to_string(),
                });
                Err(e)
            }
            Some(Ok(resource)) => Ok(resource),
            None => Err(CoreError::Validation(format!(
                "operation {} has no terminal status",
                reference
            ))),
        }
    }

    /// Replay a cached terminal status
    fn terminal_outcome(&self, reference: &OperationReference) -> Option<Result<T>> {
        match self.last_status.as_ref()? {
            PollStatus::Succeeded(resource) => Some(Ok(resource.clone())),
            PollStatus::Failed(error) => Some(Err(CoreError::OperationFailed {
                reference: reference.clone(),
                error: error.clone(),
            })),
            PollStatus::Canceled(error) => Some(Err(CoreError::OperationCanceled {
                reference: Some(reference.clone()),
                origin: CancelOrigin::Server,
                error: Some(error.clone()),
            })),
            PollStatus::InProgress { .. } => None,
        }
    }

    /// Turn a Succeeded status into the final resource
    async fn materialize(&self, body: Option<Value>) -> Result<T> {
        match (body, &self.resource_location) {
            (Some(body), _) if !body.is_null() => decode(Some(body)),
            (_, Some(location)) => {
                debug!(%location, "Succeeded without a body; fetching resource");
                let response = self.transport.get_resource(location).await?;
                decode(response.body)
            }
            (_, None) => decode(None),
        }
    }
}

fn failure_payload(status: &StatusResponse, code: &str, message: &str) -> ErrorPayload {
    status
        .error
        .clone()
        .unwrap_or_else(|| ErrorPayload::new(code, message))
}

fn decode<T: DeserializeOwned>(body: Option<Value>) -> Result<T> {
    Ok(serde_json::from_value(body.unwrap_or(Value::Null))?)
}
