//! HTTP connector client
//!
//! reqwest-based implementation of `ConnectorApi` speaking the connector's
//! JSON wire protocol with bearer-token authentication. Non-2xx responses
//! surface as `ApiError::RemoteStatus` carrying the remote status text.

use crate::config::PickerConfig;
use crate::error::ApiError;
use crate::remote::{ConnectionInfo, ConnectorApi};
use crate::types::{KnowledgeBaseId, Resource, ResourceId, ResourceKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Listing responses arrive as `{ "data": [ ... ] }`.
#[derive(Debug, Deserialize)]
struct ListEnvelope {
    #[serde(default)]
    data: Vec<ResourceEnvelope>,
}

#[derive(Debug, Deserialize)]
struct InodePath {
    path: String,
}

/// One resource as the connector serializes it. Older deployments emit
/// `last_modified` instead of `modified_at`.
#[derive(Debug, Deserialize)]
struct ResourceEnvelope {
    resource_id: String,
    inode_path: InodePath,
    inode_type: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default, alias = "last_modified")]
    modified_at: Option<DateTime<Utc>>,
}

impl From<ResourceEnvelope> for Resource {
    fn from(envelope: ResourceEnvelope) -> Self {
        // Anything the connector doesn't call a directory is treated as a file.
        let kind = if envelope.inode_type == "directory" {
            ResourceKind::Directory
        } else {
            ResourceKind::File
        };
        Resource {
            resource_id: envelope.resource_id,
            path: envelope.inode_path.path,
            kind,
            size: envelope.size,
            last_modified: envelope.modified_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingParams {
    embedding_model: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChunkerParams {
    chunk_size: u32,
    chunk_overlap: u32,
    chunker: String,
}

#[derive(Debug, Serialize)]
struct IndexingParams {
    ocr: bool,
    unstructured: bool,
    embedding_params: EmbeddingParams,
    chunker_params: ChunkerParams,
}

impl Default for IndexingParams {
    fn default() -> Self {
        Self {
            ocr: false,
            unstructured: true,
            embedding_params: EmbeddingParams {
                embedding_model: "text-embedding-ada-002".to_string(),
                api_key: None,
            },
            chunker_params: ChunkerParams {
                chunk_size: 1500,
                chunk_overlap: 500,
                chunker: "sentence".to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateKnowledgeBaseRequest<'a> {
    connection_id: &'a str,
    connection_source_ids: &'a [ResourceId],
    name: &'a str,
    description: &'a str,
    indexing_params: IndexingParams,
    org_level_role: Option<String>,
    cron_job_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateKnowledgeBaseResponse {
    knowledge_base_id: String,
}

/// Bearer-authenticated HTTP client for the connector API.
pub struct HttpConnectorApi {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    connection_provider: String,
    knowledge_base_name: String,
    knowledge_base_description: String,
}

impl HttpConnectorApi {
    pub fn new(config: &PickerConfig) -> Result<Self, ApiError> {
        if config.access_token.is_empty() {
            return Err(ApiError::ConfigError("access token is not set".to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            connection_provider: config.connection_provider.clone(),
            knowledge_base_name: config.knowledge_base_name.clone(),
            knowledge_base_description: config.knowledge_base_description.clone(),
        })
    }

    fn check(response: &reqwest::Response, what: &str) -> Result<(), ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(ApiError::RemoteStatus {
            status: status.as_u16(),
            message: format!(
                "{}: {}",
                what,
                status.canonical_reason().unwrap_or("unknown status")
            ),
        })
    }
}

#[async_trait]
impl ConnectorApi for HttpConnectorApi {
    async fn list_connection(&self) -> Result<ConnectionInfo, ApiError> {
        let url = format!(
            "{}/connections?connection_provider={}&limit=1",
            self.base_url, self.connection_provider
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        Self::check(&response, "fetch connection")?;

        let mut connections: Vec<ConnectionInfo> = response.json().await?;
        connections.pop().ok_or_else(|| {
            ApiError::ConfigError(format!(
                "no {} connection available for this account",
                self.connection_provider
            ))
        })
    }

    async fn list_folder_children(
        &self,
        connection_id: &str,
        folder_id: Option<&ResourceId>,
    ) -> Result<Vec<Resource>, ApiError> {
        let mut url = format!(
            "{}/connections/{}/resources/children",
            self.base_url, connection_id
        );
        if let Some(folder_id) = folder_id {
            url.push_str(&format!("?resource_id={}", folder_id));
        }
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        Self::check(&response, "fetch folder resources")?;

        let envelope: ListEnvelope = response.json().await?;
        Ok(envelope.data.into_iter().map(Resource::from).collect())
    }

    async fn create_knowledge_base(
        &self,
        connection_id: &str,
        resource_ids: &[ResourceId],
    ) -> Result<KnowledgeBaseId, ApiError> {
        let url = format!("{}/knowledge_bases", self.base_url);
        let body = CreateKnowledgeBaseRequest {
            connection_id,
            connection_source_ids: resource_ids,
            name: &self.knowledge_base_name,
            description: &self.knowledge_base_description,
            indexing_params: IndexingParams::default(),
            org_level_role: None,
            cron_job_id: None,
        };
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        Self::check(&response, "create knowledge base")?;

        let created: CreateKnowledgeBaseResponse = response.json().await?;
        Ok(created.knowledge_base_id)
    }

    async fn sync_knowledge_base(
        &self,
        knowledge_base_id: &KnowledgeBaseId,
        organization_id: &str,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/knowledge_bases/sync/trigger/{}/{}",
            self.base_url, knowledge_base_id, organization_id
        );
        tracing::debug!(%url, "triggering knowledge base sync");
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        Self::check(&response, "sync knowledge base")
    }

    async fn delete_resource(
        &self,
        knowledge_base_id: &KnowledgeBaseId,
        resource_path: &str,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/knowledge_bases/{}/resources",
            self.base_url, knowledge_base_id
        );
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.access_token)
            .query(&[("resource_path", resource_path)])
            .send()
            .await?;
        Self::check(&response, "delete resource from knowledge base")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_envelope_maps_to_resources() {
        let payload = r#"{
            "data": [
                {
                    "resource_id": "r1",
                    "inode_path": { "path": "/docs" },
                    "inode_type": "directory"
                },
                {
                    "resource_id": "r2",
                    "inode_path": { "path": "/docs/a.txt" },
                    "inode_type": "file",
                    "size": 12,
                    "modified_at": "2024-03-01T10:00:00Z"
                }
            ]
        }"#;

        let envelope: ListEnvelope = serde_json::from_str(payload).unwrap();
        let resources: Vec<Resource> = envelope.data.into_iter().map(Resource::from).collect();

        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].kind, ResourceKind::Directory);
        assert_eq!(resources[1].kind, ResourceKind::File);
        assert_eq!(resources[1].size, Some(12));
        assert!(resources[1].last_modified.is_some());
    }

    #[test]
    fn legacy_last_modified_field_is_accepted() {
        let payload = r#"{
            "resource_id": "r1",
            "inode_path": { "path": "/a" },
            "inode_type": "file",
            "last_modified": "2023-01-01T00:00:00Z"
        }"#;

        let envelope: ResourceEnvelope = serde_json::from_str(payload).unwrap();
        assert!(envelope.modified_at.is_some());
    }

    #[test]
    fn unknown_inode_types_fall_back_to_file() {
        let payload = r#"{
            "resource_id": "r1",
            "inode_path": { "path": "/a" },
            "inode_type": "symlink"
        }"#;

        let envelope: ResourceEnvelope = serde_json::from_str(payload).unwrap();
        let resource = Resource::from(envelope);
        assert_eq!(resource.kind, ResourceKind::File);
    }

    #[test]
    fn create_request_serializes_expected_body_shape() {
        let ids = vec!["r1".to_string()];
        let body = CreateKnowledgeBaseRequest {
            connection_id: "c1",
            connection_source_ids: &ids,
            name: "KB",
            description: "desc",
            indexing_params: IndexingParams::default(),
            org_level_role: None,
            cron_job_id: None,
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["connection_id"], "c1");
        assert_eq!(value["connection_source_ids"][0], "r1");
        assert_eq!(value["indexing_params"]["ocr"], false);
        assert_eq!(value["indexing_params"]["chunker_params"]["chunk_size"], 1500);
        assert!(value["org_level_role"].is_null());
        assert!(value["cron_job_id"].is_null());
    }
}
