use futures::future::join_all;
use std::collections::HashSet;
use std::future::Future;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use super::{ResourceLifecycle, generate_asset_name};
use crate::config::{FixtureConfig, FixtureMode};
use crate::error::{CoreError, LifecycleStep, Result};
use crate::poller::WaitOptions;

/// One provisioned resource as seen by consumers
#[derive(Debug, Clone)]
pub struct FixtureRecord<R> {
    /// Logical name from the fixture configuration
    pub name: String,
    pub resource: R,
    /// Set only once the grant-access operation succeeded
    pub access_uri: Option<Url>,
    pub created: bool,
}

/// A step that failed during teardown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    pub resource: String,
    pub step: LifecycleStep,
    pub message: String,
}

/// What teardown attempted and what went wrong
#[derive(Debug, Clone, Default)]
pub struct TeardownReport {
    pub attempted: Vec<(String, LifecycleStep)>,
    pub failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Resources whose delete step failed and may still exist remotely
    pub fn undeleted(&self) -> Vec<String> {
        self.failures
            .iter()
            .filter(|failure| failure.step == LifecycleStep::Delete)
            .map(|failure| failure.resource.clone())
            .collect()
    }

    async fn run<F>(&mut self, resource: &str, step: LifecycleStep, action: F)
    where
        F: Future<Output = Result<()>>,
    {
        self.attempted.push((resource.to_string(), step));
        match action.await {
            Ok(()) => debug!(%resource, %step, "Teardown step completed"),
            Err(e) => {
                warn!(%resource, %step, error = %e, "Teardown step failed; continuing");
                self.failures.push(TeardownFailure {
                    resource: resource.to_string(),
                    step,
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Provisioned resources shared read-only by many consumers
///
/// Produced by [`FixtureCoordinator::set_up`]; [`SharedFixture::tear_down`]
/// consumes it, so teardown runs at most once.
pub struct SharedFixture<L: ResourceLifecycle> {
    lifecycle: L,
    records: Vec<FixtureRecord<L::Resource>>,
    mode: FixtureMode,
}

impl<L: ResourceLifecycle> SharedFixture<L> {
    pub fn mode(&self) -> FixtureMode {
        self.mode
    }

    pub fn get(&self, name: &str) -> Option<&FixtureRecord<L::Resource>> {
        self.records.iter().find(|record| record.name == name)
    }

    pub fn resource(&self, name: &str) -> Option<&L::Resource> {
        self.get(name).map(|record| &record.resource)
    }

    /// Time-limited read URI for a resource
    pub fn access_uri(&self, name: &str) -> Option<&Url> {
        self.get(name).and_then(|record| record.access_uri.as_ref())
    }

    /// Logical names in creation order
    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|record| record.name.as_str()).collect()
    }

    pub fn records(&self) -> &[FixtureRecord<L::Resource>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Best-effort cleanup; never fails
    ///
    /// Access is revoked on every created resource before any of them is
    /// deleted, both in reverse creation order. A failing step is logged and
    /// recorded, and the remaining steps still run. Nothing is retried.
    pub async fn tear_down(self, options: &WaitOptions) -> TeardownReport {
        let mut report = TeardownReport::default();
        if self.mode == FixtureMode::Playback {
            debug!("Playback mode; skipping fixture teardown");
            return report;
        }

        let created: Vec<_> = self
            .records
            .iter()
            .rev()
            .filter(|record| record.created)
            .collect();
        info!(resources = created.len(), "Tearing down shared fixture");

        for record in &created {
            report
                .run(
                    &record.name,
                    LifecycleStep::RevokeAccess,
                    self.lifecycle.revoke_access(&record.resource, options),
                )
                .await;
        }
        for record in &created {
            report
                .run(
                    &record.name,
                    LifecycleStep::Delete,
                    self.lifecycle.delete(&record.resource, options),
                )
                .await;
        }

        if report.is_clean() {
            info!("Shared fixture torn down");
        } else {
            warn!(
                failures = report.failures.len(),
                "Shared fixture teardown finished with failures"
            );
        }
        report
    }
}

/// Outcome of provisioning one resource
struct Provisioned<R> {
    name: String,
    resource: Option<R>,
    access_uri: Option<Url>,
    failure: Option<(LifecycleStep, CoreError)>,
}

impl<R> Provisioned<R> {
    fn failed(name: &str, resource: Option<R>, step: LifecycleStep, error: CoreError) -> Self {
        Self {
            name: name.to_string(),
            resource,
            access_uri: None,
            failure: Some((step, error)),
        }
    }
}

/// Builds a [`SharedFixture`]: create, settle, grant access
pub struct FixtureCoordinator<L: ResourceLifecycle> {
    lifecycle: L,
    config: FixtureConfig,
}

impl<L: ResourceLifecycle> FixtureCoordinator<L> {
    pub fn new(lifecycle: L, config: FixtureConfig) -> Self {
        Self { lifecycle, config }
    }

    /// Provision every configured resource
    ///
    /// Without a settle delay each resource runs its own create-then-grant
    /// chain concurrently with the others. With a settle delay the creates
    /// run one after another with the delay in between, then all grants run
    /// concurrently. Any failure fails the whole fixture; see
    /// [`FixtureConfig::rollback_on_failure`] for what happens to resources
    /// that were already created.
    pub async fn set_up(self, options: &WaitOptions) -> Result<SharedFixture<L>> {
        let mode = self.config.effective_mode();
        if mode == FixtureMode::Playback {
            info!("Playback mode; skipping fixture provisioning");
            return Ok(SharedFixture {
                lifecycle: self.lifecycle,
                records: Vec::new(),
                mode,
            });
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = self.config.resources.iter().find(|name| !seen.insert(*name)) {
            return Err(CoreError::Validation(format!(
                "fixture resource '{}' is configured twice",
                duplicate
            )));
        }

        info!(resources = ?self.config.resources, "Provisioning shared fixture");
        let outcomes = match self.config.settle_delay() {
            None => {
                join_all(
                    self.config
                        .resources
                        .iter()
                        .map(|name| self.provision(name, options)),
                )
                .await
            }
            Some(delay) => self.provision_staggered(delay, options).await,
        };

        let mut records = Vec::new();
        let mut first_failure = None;
        for outcome in outcomes {
            if let Some(resource) = outcome.resource {
                records.push(FixtureRecord {
                    name: outcome.name.clone(),
                    resource,
                    access_uri: outcome.access_uri,
                    created: true,
                });
            }
            if let Some((step, error)) = outcome.failure
                && first_failure.is_none()
            {
                first_failure = Some((outcome.name, step, error));
            }
        }

        let fixture = SharedFixture {
            lifecycle: self.lifecycle,
            records,
            mode,
        };
        let Some((resource, step, error)) = first_failure else {
            info!(resources = fixture.len(), "Shared fixture ready");
            return Ok(fixture);
        };

        warn!(%resource, %step, error = %error, "Fixture provisioning failed");
        let leaked = if self.config.rollback_on_failure {
            // Cleanup must not inherit a cancellation that may have caused the failure
            fixture.tear_down(&WaitOptions::new()).await.undeleted()
        } else {
            let leaked: Vec<String> = fixture.names().iter().map(|n| n.to_string()).collect();
            if !leaked.is_empty() {
                warn!(?leaked, "Rollback disabled; created resources were left in place");
            }
            leaked
        };

        Err(CoreError::ProvisioningFailed {
            resource,
            step,
            source: Box::new(error),
            leaked,
        })
    }

    fn remote_name(&self, name: &str) -> String {
        generate_asset_name(&format!("{}{}-", self.config.name_prefix, name))
    }

    async fn provision(&self, name: &str, options: &WaitOptions) -> Provisioned<L::Resource> {
        let remote = self.remote_name(name);
        match self.lifecycle.create(&remote, options).await {
            Ok(resource) => {
                info!(%name, %remote, "Fixture resource created");
                self.grant(name, resource, options).await
            }
            Err(e) => Provisioned::failed(name, None, LifecycleStep::Create, e),
        }
    }

    async fn provision_staggered(
        &self,
        delay: std::time::Duration,
        options: &WaitOptions,
    ) -> Vec<Provisioned<L::Resource>> {
        let started = Instant::now();
        let mut created = Vec::new();
        let mut failure = None;

        for (index, name) in self.config.resources.iter().enumerate() {
            if index > 0 {
                debug!(?delay, "Letting source state settle before the next create");
                if let Err(e) = options.sleep(delay, None, started).await {
                    failure = Some(Provisioned::failed(name, None, LifecycleStep::Settle, e));
                    break;
                }
            }
            let remote = self.remote_name(name);
            match self.lifecycle.create(&remote, options).await {
                Ok(resource) => {
                    info!(%name, %remote, "Fixture resource created");
                    created.push((name.as_str(), resource));
                }
                Err(e) => {
                    failure = Some(Provisioned::failed(name, None, LifecycleStep::Create, e));
                    break;
                }
            }
        }

        match failure {
            None => {
                join_all(
                    created
                        .into_iter()
                        .map(|(name, resource)| self.grant(name, resource, options)),
                )
                .await
            }
            Some(failure) => {
                let mut outcomes: Vec<_> = created
                    .into_iter()
                    .map(|(name, resource)| Provisioned {
                        name: name.to_string(),
                        resource: Some(resource),
                        access_uri: None,
                        failure: None,
                    })
                    .collect();
                outcomes.push(failure);
                outcomes
            }
        }
    }

    async fn grant(
        &self,
        name: &str,
        resource: L::Resource,
        options: &WaitOptions,
    ) -> Provisioned<L::Resource> {
        match self
            .lifecycle
            .grant_access(&resource, self.config.access_duration(), options)
            .await
        {
            Ok(uri) => {
                debug!(%name, "Read access granted");
                Provisioned {
                    name: name.to_string(),
                    resource: Some(resource),
                    access_uri: Some(uri),
                    failure: None,
                }
            }
            Err(e) => Provisioned::failed(name, Some(resource), LifecycleStep::GrantAccess, e),
        }
    }
}
