//! HTTP transport for management-plane style long-running operations
//!
//! Start calls that the service runs asynchronously answer `201`/`202` with an
//! `Azure-AsyncOperation` or `Location` header naming the status monitor, and
//! optionally a `Retry-After` hint. Status monitors either return a status
//! envelope (`{"status": "InProgress", "error": {...}}`) or, for
//! `Location`-style monitors, `202` until done and then the final body.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use crate::config::Profile;
use crate::error::Result as CoreResult;
use crate::operation::{ErrorPayload, OperationReference, OperationState};
use crate::transport::{
    Method, OperationRequest, ResourceResponse, StartResponse, StatusResponse, Transport,
    TransportError,
};

const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";
const RETRY_AFTER_MS_HEADERS: [&str; 2] = ["retry-after-ms", "x-ms-retry-after-ms"];

/// [`Transport`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    api_version: Option<String>,
}

impl HttpTransport {
    /// `endpoint` should end with `/` so relative ids resolve beneath it
    pub fn new(endpoint: Url) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    pub fn with_client(client: Client, endpoint: Url) -> Self {
        Self {
            client,
            endpoint,
            api_version: None,
        }
    }

    /// Transport whose requests carry `user_agent`
    pub fn with_user_agent(endpoint: Url, user_agent: &str) -> Result<Self, TransportError> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self::with_client(client, endpoint))
    }

    /// Append `api-version=<version>` to every request that lacks one
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Transport for a named profile, carrying its API version
    pub fn from_profile(name: &str, profile: &Profile) -> CoreResult<Self> {
        let transport = Self::new(profile.endpoint_url(name)?);
        Ok(match &profile.api_version {
            Some(version) => transport.api_version(version.clone()),
            None => transport,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Resolve an id, path or absolute URL against the endpoint
    fn resolve(&self, target: &str) -> Result<Url, TransportError> {
        let mut url = if target.starts_with("http://") || target.starts_with("https://") {
            Url::parse(target)
        } else {
            self.endpoint.join(target.trim_start_matches('/'))
        }
        .map_err(|e| TransportError::network(format!("invalid target '{}': {}", target, e)))?;

        if let Some(version) = &self.api_version
            && !url.query_pairs().any(|(key, _)| key == "api-version")
        {
            url.query_pairs_mut().append_pair("api-version", version);
        }
        Ok(url)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Reply, TransportError> {
        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;

        let body = if bytes.is_empty() {
            None
        } else {
            Some(serde_json::from_slice::<Value>(&bytes).map_err(|e| {
                TransportError::new(status.as_u16(), format!("invalid JSON body: {}", e))
            })?)
        };
        trace!(status = status.as_u16(), "Received response");

        if !status.is_success() {
            return Err(error_from_reply(status, body.as_ref()));
        }
        Ok(Reply {
            status,
            headers,
            body,
        })
    }
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Value>,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Put => reqwest::Method::PUT,
        Method::Post => reqwest::Method::POST,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Server delay hint; millisecond headers win over `Retry-After` seconds
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    RETRY_AFTER_MS_HEADERS
        .iter()
        .find_map(|name| header_str(headers, name)?.parse::<u64>().ok())
        .map(Duration::from_millis)
        .or_else(|| {
            header_str(headers, RETRY_AFTER.as_str())?
                .parse::<u64>()
                .ok()
                .map(Duration::from_secs)
        })
}

fn error_payload(body: Option<&Value>, status: StatusCode) -> Option<ErrorPayload> {
    let error = body?.get("error")?;
    let payload: ErrorPayload = serde_json::from_value(error.clone()).ok()?;
    Some(payload.with_status(status.as_u16()))
}

fn error_from_reply(status: StatusCode, body: Option<&Value>) -> TransportError {
    let message = error_payload(body, status)
        .map(|payload| {
            if payload.code.is_empty() {
                payload.message
            } else {
                format!("{}: {}", payload.code, payload.message)
            }
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    TransportError::new(status.as_u16(), message)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start_operation(
        &self,
        request: &OperationRequest,
    ) -> Result<StartResponse, TransportError> {
        let url = self.resolve(&request.target)?;
        debug!(method = %request.method, %url, "Sending request");

        let mut builder = self.client.request(to_reqwest(request.method), url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let reply = self.send(builder).await?;

        let accepted = matches!(reply.status, StatusCode::CREATED | StatusCode::ACCEPTED);
        let location = accepted
            .then(|| header_str(&reply.headers, LOCATION.as_str()))
            .flatten();
        let (monitor, final_location) = match header_str(&reply.headers, ASYNC_OPERATION_HEADER) {
            // Status envelope at the monitor, final result at Location
            Some(async_operation) => (Some(async_operation), location),
            None => (location, None),
        };

        Ok(StartResponse {
            status_code: reply.status.as_u16(),
            operation_reference: monitor.map(OperationReference::new),
            final_location: final_location.map(str::to_string),
            retry_after: retry_after(&reply.headers),
            body: reply.body,
        })
    }

    async fn get_operation_status(
        &self,
        reference: &OperationReference,
    ) -> Result<StatusResponse, TransportError> {
        let url = self.resolve(reference.as_str())?;
        let reply = self.send(self.client.get(url)).await?;
        let retry_after = retry_after(&reply.headers);

        if reply.status == StatusCode::ACCEPTED {
            return Ok(StatusResponse::in_progress(retry_after));
        }

        let status_field = reply
            .body
            .as_ref()
            .and_then(|body| body.get("status"))
            .and_then(Value::as_str);

        match status_field {
            Some(status) => {
                let state = OperationState::from_status(status);
                let error = match state {
                    OperationState::Failed | OperationState::Canceled => {
                        error_payload(reply.body.as_ref(), reply.status)
                    }
                    _ => None,
                };
                // Actions may report their result inline in the envelope
                let resource_body = match state {
                    OperationState::Succeeded => reply
                        .body
                        .as_ref()
                        .and_then(|body| body.pointer("/properties/output"))
                        .cloned(),
                    _ => None,
                };
                Ok(StatusResponse {
                    state,
                    retry_after,
                    resource_body,
                    error,
                })
            }
            // Location-style monitor: a non-202 success is the final result
            None => Ok(StatusResponse::succeeded(reply.body)),
        }
    }

    async fn get_resource(&self, resource_id: &str) -> Result<ResourceResponse, TransportError> {
        let url = self.resolve(resource_id)?;
        let reply = self.send(self.client.get(url)).await?;
        Ok(ResourceResponse {
            status_code: reply.status.as_u16(),
            body: reply.body,
        })
    }
}
