//! Generic resource operations on top of the poller
//!
//! One client covers every resource type: mutating calls return a
//! [`Poller`] for the caller to drive, and the `*_and_wait` helpers compose
//! start, poll and fetch the way most callers want:
//!
//! 1. Start the operation (returns a pending reference or the resource)
//! 2. Poll until completion
//! 3. Fetch and return the materialized resource

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::config::PollingConfig;
use crate::error::{CoreError, Result};
use crate::poller::{Poller, WaitOptions};
use crate::transport::{OperationRequest, Transport};

/// How to read a 403 when probing for a resource
///
/// Some services answer "forbidden" rather than "not found" for resources
/// that do not exist (management groups are a known case).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExistencePolicy {
    /// Only 404 means absent
    #[default]
    Strict,
    /// 403 is treated like 404
    ForbiddenMeansAbsent,
}

/// Minimal view of a listed resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

/// Resource client over any [`Transport`]
#[derive(Clone)]
pub struct ResourceClient {
    transport: Arc<dyn Transport>,
    polling: PollingConfig,
    existence: ExistencePolicy,
}

impl ResourceClient {
    pub fn new(transport: Arc<dyn Transport>, polling: PollingConfig) -> Self {
        Self {
            transport,
            polling,
            existence: ExistencePolicy::default(),
        }
    }

    pub fn with_existence_policy(mut self, policy: ExistencePolicy) -> Self {
        self.existence = policy;
        self
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn polling(&self) -> &PollingConfig {
        &self.polling
    }

    /// Options with the profile's default timeout applied
    pub fn default_wait_options(&self) -> WaitOptions {
        match self.polling.timeout() {
            Some(timeout) => WaitOptions::new().with_timeout(timeout),
            None => WaitOptions::new(),
        }
    }

    /// Start an arbitrary operation
    pub async fn begin<T>(
        &self,
        request: &OperationRequest,
        resource_location: Option<String>,
    ) -> Result<Poller<T>>
    where
        T: DeserializeOwned + Clone,
    {
        Poller::start(
            self.transport.clone(),
            &self.polling,
            request,
            resource_location,
        )
        .await
    }

    /// PUT `body` at `id`; completion fetches `id` when the status has no body
    pub async fn begin_create_or_update<T>(&self, id: &str, body: Value) -> Result<Poller<T>>
    where
        T: DeserializeOwned + Clone,
    {
        self.begin(&OperationRequest::put(id, body), Some(id.to_string()))
            .await
    }

    /// DELETE `id`; any final body is returned untyped
    pub async fn begin_delete(&self, id: &str) -> Result<Poller<Value>> {
        self.begin(&OperationRequest::delete(id), None).await
    }

    /// POST `{id}/{action}`; the action's result comes from the operation itself
    pub async fn begin_action<T>(
        &self,
        id: &str,
        action: &str,
        body: Option<Value>,
    ) -> Result<Poller<T>>
    where
        T: DeserializeOwned + Clone,
    {
        let target = format!("{}/{}", id.trim_end_matches('/'), action);
        self.begin(&OperationRequest::post(target, body), None).await
    }

    /// Create or update a resource and wait for it to materialize
    pub async fn create_or_update_and_wait<T>(
        &self,
        id: &str,
        body: Value,
        options: &WaitOptions,
    ) -> Result<T>
    where
        T: DeserializeOwned + Clone,
    {
        let mut poller = self.begin_create_or_update(id, body).await?;
        poller.wait_for_completion(options).await
    }

    /// Delete a resource and wait for the deletion to finish
    pub async fn delete_and_wait(&self, id: &str, options: &WaitOptions) -> Result<()> {
        let mut poller = self.begin_delete(id).await?;
        poller.wait_for_completion(options).await?;
        Ok(())
    }

    /// Fetch a resource
    pub async fn get<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        let response = self.transport.get_resource(id).await?;
        Ok(serde_json::from_value(response.body.unwrap_or(Value::Null))?)
    }

    /// Fetch a resource, mapping "absent" to `None`
    pub async fn get_if_exists<T: DeserializeOwned>(&self, id: &str) -> Result<Option<T>> {
        match self.get(id).await {
            Ok(resource) => Ok(Some(resource)),
            Err(e) if self.is_absent(&e) => {
                debug!(%id, error = %e, "Resource absent");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Check whether a resource exists
    pub async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.get_if_exists::<Value>(id).await?.is_some())
    }

    /// List a collection, following `nextLink` pages
    pub async fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(collection.to_string());

        while let Some(page_url) = next.take() {
            let page = self
                .transport
                .get_resource(&page_url)
                .await?
                .body
                .unwrap_or(Value::Null);

            match page.get("value") {
                Some(Value::Array(values)) => {
                    for value in values {
                        items.push(serde_json::from_value(value.clone())?);
                    }
                }
                Some(_) | None => {
                    return Err(CoreError::Validation(format!(
                        "list response for '{}' has no 'value' array",
                        page_url
                    )));
                }
            }

            next = page
                .get("nextLink")
                .and_then(Value::as_str)
                .filter(|link| !link.is_empty())
                .map(str::to_string);
        }

        Ok(items)
    }

    fn is_absent(&self, err: &CoreError) -> bool {
        err.is_not_found()
            || (self.existence == ExistencePolicy::ForbiddenMeansAbsent && err.is_forbidden())
    }
}
