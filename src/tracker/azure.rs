use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{Tracker, TrackerError};
use crate::config::EndpointConfig;
use crate::model::work_item::{PatchDocument, WorkItemId};

const JSON_PATCH_CONTENT_TYPE: &str = "application/json-patch+json";

pub struct AzureDevOpsTracker {
    endpoint: EndpointConfig,
    auth_header: String,
    client: reqwest::Client,
}

impl AzureDevOpsTracker {
    pub fn new(endpoint: EndpointConfig, token: &str) -> Result<Self, TrackerError> {
        Self::with_builder(endpoint, token, reqwest::Client::builder())
    }

    fn with_builder(
        endpoint: EndpointConfig,
        token: &str,
        builder: reqwest::ClientBuilder,
    ) -> Result<Self, TrackerError> {
        let client = builder
            .connect_timeout(endpoint.timeout)
            .read_timeout(endpoint.timeout)
            .build()
            .map_err(|e| TrackerError::Request {
                url: endpoint.work_item_url.clone(),
                message: e.to_string(),
            })?;
        debug!("Using project {} at {}", endpoint.project_path, endpoint.work_item_url);
        Ok(Self {
            auth_header: basic_auth_header(token),
            endpoint,
            client,
        })
    }

    async fn send(&self, url: &str, request: reqwest::RequestBuilder) -> Result<reqwest::Response, TrackerError> {
        let resp = request
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| send_error(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TrackerError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

/// Personal access tokens go in the password slot with an empty user name.
pub fn basic_auth_header(token: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!(":{token}"));
    format!("Basic {encoded}")
}

/// Error raised before any response arrived. A timeout at this stage means
/// the service never answered and is fatal to the whole run.
fn send_error(url: &str, err: reqwest::Error) -> TrackerError {
    if err.is_timeout() {
        TrackerError::ConnectTimeout { url: url.to_string() }
    } else {
        body_error(url, err)
    }
}

/// Error raised while reading the body of a response that did arrive.
fn body_error(url: &str, err: reqwest::Error) -> TrackerError {
    TrackerError::Request {
        url: url.to_string(),
        message: err.to_string(),
    }
}

fn decode_error(url: &str, err: impl std::fmt::Display) -> TrackerError {
    TrackerError::Decode {
        url: url.to_string(),
        message: err.to_string(),
    }
}

#[derive(Deserialize)]
struct WorkItemResponse {
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(rename = "workItems", default)]
    work_items: Vec<WorkItemRef>,
}

#[derive(Deserialize)]
struct WorkItemRef {
    id: WorkItemId,
}

fn parse_query_response(body: &str) -> Result<Vec<WorkItemId>, serde_json::Error> {
    let parsed: QueryResponse = serde_json::from_str(body)?;
    Ok(parsed.work_items.into_iter().map(|w| w.id).collect())
}

fn parse_fields(body: &str) -> Result<Map<String, Value>, serde_json::Error> {
    let parsed: WorkItemResponse = serde_json::from_str(body)?;
    Ok(parsed.fields)
}

#[async_trait]
impl Tracker for AzureDevOpsTracker {
    fn name(&self) -> &str {
        "Azure DevOps"
    }

    async fn get_fields(&self, id: WorkItemId) -> Result<Map<String, Value>, TrackerError> {
        let url = self.endpoint.work_item(id);
        debug!("GET {url}");
        let request = self
            .client
            .get(&url)
            .query(&[("api-version", &self.endpoint.work_item_api_version)]);
        let resp = self.send(&url, request).await?;
        let body = resp.text().await.map_err(|e| body_error(&url, e))?;
        parse_fields(&body).map_err(|e| decode_error(&url, e))
    }

    async fn query(&self, wiql: &str) -> Result<Vec<WorkItemId>, TrackerError> {
        let url = &self.endpoint.query_url;
        debug!("POST {url}: {wiql}");
        let request = self
            .client
            .post(url)
            .query(&[("api-version", &self.endpoint.query_api_version)])
            .json(&QueryRequest { query: wiql });
        let resp = self.send(url, request).await?;
        let body = resp.text().await.map_err(|e| body_error(url, e))?;
        parse_query_response(&body).map_err(|e| decode_error(url, e))
    }

    async fn patch(&self, id: WorkItemId, document: &PatchDocument) -> Result<u16, TrackerError> {
        let url = self.endpoint.work_item(id);
        let body = serde_json::to_string(document).map_err(|e| decode_error(&url, e))?;
        debug!("PATCH {url}: {body}");
        let request = self
            .client
            .patch(&url)
            .query(&[("api-version", &self.endpoint.work_item_api_version)])
            .header("Content-Type", JSON_PATCH_CONTENT_TYPE)
            .body(body);
        let resp = self.send(&url, request).await?;
        Ok(resp.status().as_u16())
    }
}
