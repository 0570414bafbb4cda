//! Shared resource fixtures
//!
//! A fixture provisions a set of remote resources once, hands read-only
//! access to many consumers, and tears everything down at the end. The
//! composition root owns the lifecycle:
//!
//! ```rust,ignore
//! let fixture = FixtureCoordinator::new(lifecycle, profile.fixture.clone())
//!     .set_up(&WaitOptions::new())
//!     .await?;
//!
//! run_consumers(&fixture).await;
//!
//! let report = fixture.tear_down(&WaitOptions::new()).await;
//! ```
//!
//! Teardown happens once, after every consumer finished. Deleting one
//! resource while another is still being read has been seen to revoke access
//! to its siblings, so per-consumer cleanup is deliberately not offered.

mod coordinator;
mod snapshot;

pub use coordinator::{
    FixtureCoordinator, FixtureRecord, SharedFixture, TeardownFailure, TeardownReport,
};
pub use snapshot::{AccessGrant, Snapshot, SnapshotLifecycle};

use async_trait::async_trait;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::error::Result;
use crate::poller::WaitOptions;

/// The four remote steps a fixture drives for each resource
#[async_trait]
pub trait ResourceLifecycle: Send + Sync {
    type Resource: Clone + Send + Sync;

    /// Create the resource named `name` and wait until it exists
    async fn create(&self, name: &str, options: &WaitOptions) -> Result<Self::Resource>;

    /// Grant read access for `duration`, returning the access URI
    async fn grant_access(
        &self,
        resource: &Self::Resource,
        duration: Duration,
        options: &WaitOptions,
    ) -> Result<Url>;

    async fn revoke_access(&self, resource: &Self::Resource, options: &WaitOptions) -> Result<()>;

    async fn delete(&self, resource: &Self::Resource, options: &WaitOptions) -> Result<()>;
}

/// Unique remote name: `prefix` followed by a hyphen-free UUID
pub fn generate_asset_name(prefix: &str) -> String {
    format!("{}{}", prefix, Uuid::new_v4().simple())
}
