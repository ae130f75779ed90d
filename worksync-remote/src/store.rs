//! The remote record store capability.
//!
//! Transports (REST, GraphQL) implement [`RemoteStore`]; the engine never
//! sees wire formats. Every method is a single attempt: retrying is the
//! executor's job, so implementations must not retry internally.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use worksync_core::{WorkItem, WorkItemId};

use crate::error::RemoteFailure;
use crate::rate_limit::RateLimitInfo;

/// Handle to a record on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRef {
    pub id: WorkItemId,
    /// Remote-assigned record number.
    pub number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Open records, already mapped into the work-item shape.
    async fn list_items(&self) -> Result<Vec<WorkItem>, RemoteFailure>;

    async fn create_item(&self, item: &WorkItem) -> Result<RemoteRef, RemoteFailure>;

    async fn update_item(&self, item: &WorkItem) -> Result<RemoteRef, RemoteFailure>;

    /// Close (not delete) the record for `id`.
    async fn close_item(&self, id: &WorkItemId) -> Result<(), RemoteFailure>;

    async fn graphql(&self, query: &str, variables: &Value) -> Result<Value, RemoteFailure>;

    async fn rate_limit(&self) -> Result<RateLimitInfo, RemoteFailure>;
}
