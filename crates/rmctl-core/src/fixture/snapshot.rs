//! Disk snapshots as fixture resources
//!
//! Each snapshot is an incremental copy of one source disk. Read access is a
//! SAS URI handed out by the `beginGetAccess` action and withdrawn again by
//! `endGetAccess`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::ResourceLifecycle;
use crate::error::{CoreError, Result};
use crate::poller::WaitOptions;
use crate::resource::{ResourceClient, ResourceSummary};

/// A snapshot as returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub properties: Value,
}

/// Result of `beginGetAccess`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccessGrant {
    #[serde(rename = "accessSAS")]
    pub access_sas: String,
}

/// [`ResourceLifecycle`] for snapshots of a single source disk
#[derive(Clone)]
pub struct SnapshotLifecycle {
    client: ResourceClient,
    collection: String,
    source_id: String,
    location: String,
    incremental: bool,
}

impl SnapshotLifecycle {
    /// `collection` is the snapshots collection path new snapshots are
    /// created under; `source_id` is the disk they copy
    pub fn new(
        client: ResourceClient,
        collection: impl Into<String>,
        source_id: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            client,
            collection: collection.into().trim_end_matches('/').to_string(),
            source_id: source_id.into(),
            location: location.into(),
            incremental: true,
        }
    }

    /// Full copies instead of incremental snapshots
    pub fn incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// First resource in `collection` whose name contains `prefix`
    pub async fn discover_source(
        client: &ResourceClient,
        collection: &str,
        prefix: &str,
    ) -> Result<ResourceSummary> {
        let candidates: Vec<ResourceSummary> = client.list(collection).await?;
        debug!(%collection, count = candidates.len(), "Listed source candidates");

        candidates
            .into_iter()
            .find(|candidate| candidate.name.contains(prefix))
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "no resource in '{}' has a name containing '{}'",
                    collection, prefix
                ))
            })
    }

    fn create_body(&self) -> Value {
        json!({
            "location": self.location,
            "properties": {
                "creationData": {
                    "createOption": "Copy",
                    "sourceResourceId": self.source_id,
                },
                "incremental": self.incremental,
            }
        })
    }
}

#[async_trait]
impl ResourceLifecycle for SnapshotLifecycle {
    type Resource = Snapshot;

    async fn create(&self, name: &str, options: &WaitOptions) -> Result<Snapshot> {
        let id = format!("{}/{}", self.collection, name);
        info!(%id, source = %self.source_id, "Creating snapshot");
        self.client
            .create_or_update_and_wait(&id, self.create_body(), options)
            .await
    }

    async fn grant_access(
        &self,
        snapshot: &Snapshot,
        duration: Duration,
        options: &WaitOptions,
    ) -> Result<Url> {
        let body = json!({
            "access": "Read",
            "durationInSeconds": duration.as_secs(),
        });
        let mut poller = self
            .client
            .begin_action::<AccessGrant>(&snapshot.id, "beginGetAccess", Some(body))
            .await?;
        let grant = poller.wait_for_completion(options).await?;

        Url::parse(&grant.access_sas).map_err(|e| {
            CoreError::Validation(format!(
                "access URI for '{}' is not a valid URL: {}",
                snapshot.name, e
            ))
        })
    }

    async fn revoke_access(&self, snapshot: &Snapshot, options: &WaitOptions) -> Result<()> {
        let mut poller = self
            .client
            .begin_action::<Value>(&snapshot.id, "endGetAccess", None)
            .await?;
        poller.wait_for_completion(options).await?;
        Ok(())
    }

    async fn delete(&self, snapshot: &Snapshot, options: &WaitOptions) -> Result<()> {
        self.client.delete_and_wait(&snapshot.id, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FixtureConfig, PollingConfig};
    use crate::fixture::FixtureCoordinator;
    use crate::operation::OperationReference;
    use crate::testing::{RecordedCall, ScriptedTransport};
    use crate::transport::{Method, ResourceResponse, StartResponse, StatusResponse};
    use std::sync::Arc;

    const COLLECTION: &str = "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.Compute/snapshots";

    fn pending(reference: &str) -> StartResponse {
        StartResponse {
            status_code: 202,
            body: None,
            operation_reference: Some(OperationReference::new(reference)),
            final_location: None,
            retry_after: None,
        }
    }

    fn lifecycle(transport: &Arc<ScriptedTransport>) -> SnapshotLifecycle {
        let client = ResourceClient::new(transport.clone(), PollingConfig::default());
        SnapshotLifecycle::new(client, COLLECTION, "/disks/source", "westus2")
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_sends_incremental_copy() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_start(Ok(pending("ops/create")));
        transport.push_status(Ok(StatusResponse::succeeded(None)));
        transport.push_resource(Ok(ResourceResponse {
            status_code: 200,
            body: Some(json!({"id": format!("{COLLECTION}/snap"), "name": "snap"})),
        }));

        let snapshot = lifecycle(&transport)
            .create("snap", &WaitOptions::new())
            .await
            .unwrap();
        assert_eq!(snapshot.name, "snap");

        match &transport.calls()[0] {
            RecordedCall::Start(request) => {
                assert_eq!(request.method, Method::Put);
                assert_eq!(request.target, format!("{COLLECTION}/snap"));
                let body = request.body.as_ref().unwrap();
                assert_eq!(body["properties"]["creationData"]["createOption"], "Copy");
                assert_eq!(
                    body["properties"]["creationData"]["sourceResourceId"],
                    "/disks/source"
                );
                assert_eq!(body["properties"]["incremental"], true);
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_grant_rejects_invalid_uri() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_start(Ok(StartResponse {
            status_code: 200,
            body: Some(json!({"accessSAS": "not a url"})),
            operation_reference: None,
            final_location: None,
            retry_after: None,
        }));

        let snapshot = Snapshot {
            id: "/snapshots/a".to_string(),
            name: "a".to_string(),
            location: None,
            properties: Value::Null,
        };
        let err = lifecycle(&transport)
            .grant_access(&snapshot, Duration::from_secs(60), &WaitOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_source_by_prefix() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_resource(Ok(ResourceResponse {
            status_code: 200,
            body: Some(json!({"value": [
                {"id": "/disks/os-disk", "name": "os-disk"},
                {"id": "/disks/vm1-data-1", "name": "vm1-data-1"},
                {"id": "/disks/data-2", "name": "data-2"}
            ]})),
        }));
        transport.push_resource(Ok(ResourceResponse {
            status_code: 200,
            body: Some(json!({"value": [{"id": "/disks/os-disk", "name": "os-disk"}]})),
        }));
        let client = ResourceClient::new(transport.clone(), PollingConfig::default());

        let source = SnapshotLifecycle::discover_source(&client, "/disks", "data-")
            .await
            .unwrap();
        assert_eq!(source.id, "/disks/vm1-data-1");

        let err = SnapshotLifecycle::discover_source(&client, "/disks", "data-")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test(start_paused = true)]
    #[serial_test::serial]
    async fn test_fixture_grants_only_after_create_completes() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_start(Ok(pending("ops/create")));
        transport.push_status(Ok(StatusResponse::in_progress(None)));
        transport.push_status(Ok(StatusResponse::succeeded(None)));
        transport.push_resource(Ok(ResourceResponse {
            status_code: 200,
            body: Some(json!({"id": format!("{COLLECTION}/snap"), "name": "snap"})),
        }));
        transport.push_start(Ok(pending("ops/grant")));
        transport.push_status(Ok(StatusResponse::succeeded(Some(
            json!({"accessSAS": "https://blob.example.test/snap?sig=read"}),
        ))));

        let config = FixtureConfig {
            resources: vec!["snapshot1".to_string()],
            ..Default::default()
        };
        let fixture = FixtureCoordinator::new(lifecycle(&transport), config)
            .set_up(&WaitOptions::new())
            .await
            .unwrap();

        assert_eq!(
            fixture.access_uri("snapshot1").map(Url::as_str),
            Some("https://blob.example.test/snap?sig=read")
        );

        let calls = transport.calls();
        let create_done = calls
            .iter()
            .position(|call| matches!(call, RecordedCall::GetResource(_)))
            .unwrap();
        let grant_start = calls
            .iter()
            .position(|call| {
                matches!(call, RecordedCall::Start(request) if request.target.ends_with("/beginGetAccess"))
            })
            .unwrap();
        assert!(create_done < grant_start);
        assert_eq!(
            calls[grant_start + 1],
            RecordedCall::GetStatus("ops/grant".to_string())
        );
    }
}
