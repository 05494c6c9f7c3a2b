pub mod azure;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::work_item::{PatchDocument, WorkItemId};

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Connection timeout for {url}")]
    ConnectTimeout { url: String },

    #[error("HTTP {status} from {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("Failed to parse response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl TrackerError {
    pub fn is_connect_timeout(&self) -> bool {
        matches!(self, TrackerError::ConnectTimeout { .. })
    }
}

/// Remote system of record for work items.
#[async_trait]
pub trait Tracker: Send + Sync {
    fn name(&self) -> &str;
    /// Current field map of one work item.
    async fn get_fields(&self, id: WorkItemId) -> Result<Map<String, Value>, TrackerError>;
    /// Run a WIQL query and return matching ids in service order.
    async fn query(&self, wiql: &str) -> Result<Vec<WorkItemId>, TrackerError>;
    /// Apply a JSON-patch document. Returns the (2xx) status code.
    async fn patch(&self, id: WorkItemId, document: &PatchDocument) -> Result<u16, TrackerError>;
}
