//! # rmctl-core
//!
//! Client-side machinery for remote resource-management APIs whose mutating
//! calls run as long-running operations (LROs).
//!
//! ## What Lives Here
//!
//! - **Transport** - the three remote calls everything else is built on
//!   ([`Transport`]), plus an HTTP implementation ([`HttpTransport`])
//! - **Poller** - drives one operation from start to a terminal state with
//!   floored exponential backoff, server retry hints, deadlines and
//!   cancellation ([`Poller`], [`WaitOptions`])
//! - **Resources** - create/update/delete/action helpers, existence probes
//!   and paged listing over any transport ([`ResourceClient`])
//! - **Fixtures** - provision a set of resources once, share read-only
//!   access, tear everything down at the end ([`fixture`])
//! - **Config** - TOML profiles with polling and fixture settings ([`config`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use rmctl_core::{HttpTransport, ResourceClient, WaitOptions};
//! use std::sync::Arc;
//!
//! let transport = HttpTransport::from_profile(&name, &profile)?;
//! let client = ResourceClient::new(Arc::new(transport), profile.polling.clone());
//!
//! let snapshot: serde_json::Value = client
//!     .create_or_update_and_wait(&id, body, &client.default_wait_options())
//!     .await?;
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod fixture;
pub mod http;
pub mod operation;
pub mod poller;
pub mod progress;
pub mod resource;
pub mod transport;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use backoff::Backoff;
pub use config::{Config, FixtureConfig, FixtureMode, PollingConfig, Profile};
pub use error::{CancelOrigin, CoreError, LifecycleStep, Result};
pub use fixture::{
    FixtureCoordinator, FixtureRecord, ResourceLifecycle, SharedFixture, SnapshotLifecycle,
    TeardownReport,
};
pub use http::HttpTransport;
pub use operation::{ErrorPayload, OperationReference, OperationState, PollStatus, StartResult};
pub use poller::{Poller, WaitOptions};
pub use progress::{ProgressCallback, ProgressEvent};
pub use resource::{ExistencePolicy, ResourceClient, ResourceSummary};
pub use transport::{
    Method, OperationRequest, ResourceResponse, StartResponse, StatusResponse, Transport,
    TransportError,
};
