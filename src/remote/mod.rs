//! Remote connector API
//!
//! Typed surface over the resource-listing and knowledge-base endpoints.
//! Everything here is thin plumbing; the interesting state lives in the
//! cache. Membership is authoritative only through the knowledge-base
//! workflow, so listings fetched here must always go through the merge
//! engine, never straight into membership writes.

pub mod http;

pub use http::HttpConnectorApi;

use crate::error::ApiError;
use crate::types::{KnowledgeBaseId, Resource, ResourceId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection metadata as reported by the remote connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub connection_id: String,
    pub org_id: String,
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Client seam for the remote connector and knowledge-base APIs.
#[async_trait]
pub trait ConnectorApi: Send + Sync {
    /// Fetch the active connection for the configured provider.
    async fn list_connection(&self) -> Result<ConnectionInfo, ApiError>;

    /// List the children of a folder; `None` lists the connection root.
    async fn list_folder_children(
        &self,
        connection_id: &str,
        folder_id: Option<&ResourceId>,
    ) -> Result<Vec<Resource>, ApiError>;

    /// Create a knowledge base over the given resources and return its id.
    async fn create_knowledge_base(
        &self,
        connection_id: &str,
        resource_ids: &[ResourceId],
    ) -> Result<KnowledgeBaseId, ApiError>;

    /// Trigger indexing/synchronization of a created knowledge base.
    async fn sync_knowledge_base(
        &self,
        knowledge_base_id: &KnowledgeBaseId,
        organization_id: &str,
    ) -> Result<(), ApiError>;

    /// Remove one resource, addressed by path, from a knowledge base.
    async fn delete_resource(
        &self,
        knowledge_base_id: &KnowledgeBaseId,
        resource_path: &str,
    ) -> Result<(), ApiError>;
}
