//! Knowledge-base operation workflow
//!
//! Drives the multi-step remote workflows (create → mark indexed → sync, and
//! scoped delete) and owns the operation status state machine. Cache
//! mutations happen strictly after the corresponding remote call confirmed
//! success, so a failed step leaves local state exactly as it was.

use crate::cache::ResourceCache;
use crate::error::ApiError;
use crate::remote::ConnectorApi;
use crate::types::{is_strict_descendant, KnowledgeBaseId, ResourceId, ResourceKind};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Status of the coordinator, driving UI affordances. Always settles back to
/// `Idle`: immediately on failure, after a short display delay on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Idle,
    Creating,
    Created,
    Syncing,
    Synced,
    Error,
    Deleting,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationStatus::Idle => "idle",
            OperationStatus::Creating => "creating",
            OperationStatus::Created => "created",
            OperationStatus::Syncing => "syncing",
            OperationStatus::Synced => "synced",
            OperationStatus::Error => "error",
            OperationStatus::Deleting => "deleting",
        };
        f.write_str(s)
    }
}

/// Operand snapshot for a create call, captured from the cache at call time
/// so navigation during the request cannot change the operand list.
#[derive(Debug, Clone)]
pub struct CreateOperand {
    pub resource_id: ResourceId,
    pub path: Option<String>,
    pub kind: Option<ResourceKind>,
}

/// Operand for a scoped delete; the remote call addresses the resource by
/// path within the knowledge base.
#[derive(Debug, Clone)]
pub struct DeleteOperand {
    pub resource_id: ResourceId,
    pub path: String,
}

/// Drop selected files that are descendants of a selected directory; the
/// directory's inclusion already subsumes them. Directories are never
/// dropped.
pub fn filter_redundant_descendants(operands: Vec<CreateOperand>) -> Vec<CreateOperand> {
    let directory_paths: Vec<String> = operands
        .iter()
        .filter(|op| op.kind == Some(ResourceKind::Directory))
        .filter_map(|op| op.path.clone())
        .collect();

    operands
        .into_iter()
        .filter(|op| {
            if op.kind == Some(ResourceKind::Directory) {
                return true;
            }
            match &op.path {
                Some(path) => !directory_paths
                    .iter()
                    .any(|dir| is_strict_descendant(dir, path)),
                None => true,
            }
        })
        .collect()
}

/// Coordinator for remote knowledge-base operations.
///
/// Exactly one operation may be in flight at a time; entry points refuse
/// with `ApiError::OperationInFlight` while busy. Status transitions are
/// published on a watch channel for the UI.
pub struct OperationCoordinator<A: ConnectorApi> {
    api: Arc<A>,
    cache: Arc<ResourceCache>,
    status_tx: watch::Sender<OperationStatus>,
    settle_delay: Duration,
}

impl<A: ConnectorApi> OperationCoordinator<A> {
    pub fn new(api: Arc<A>, cache: Arc<ResourceCache>) -> Self {
        Self {
            api,
            cache,
            status_tx: watch::Sender::new(OperationStatus::Idle),
            settle_delay: Duration::from_secs(5),
        }
    }

    /// How long the terminal `Synced` status stays visible before settling
    /// back to `Idle`.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn status(&self) -> OperationStatus {
        *self.status_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<OperationStatus> {
        self.status_tx.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.status() != OperationStatus::Idle
    }

    /// Atomically claim the state machine for a new operation.
    fn begin(&self, next: OperationStatus) -> Result<(), ApiError> {
        let claimed = self.status_tx.send_if_modified(|status| {
            if *status == OperationStatus::Idle {
                *status = next;
                true
            } else {
                false
            }
        });
        if claimed {
            Ok(())
        } else {
            Err(ApiError::OperationInFlight)
        }
    }

    fn publish(&self, status: OperationStatus) {
        self.status_tx.send_replace(status);
    }

    fn fail(&self, step: &str, err: &ApiError) {
        tracing::error!(error = %err, step, "knowledge base operation failed");
        self.publish(OperationStatus::Error);
        self.publish(OperationStatus::Idle);
    }

    /// Create path: create the knowledge base from the (redundancy-filtered)
    /// operands, record the new memberships, then trigger a sync. The cache
    /// is only written once the create call has succeeded.
    pub async fn create_and_sync(
        &self,
        connection_id: &str,
        organization_id: &str,
        operands: Vec<CreateOperand>,
    ) -> Result<KnowledgeBaseId, ApiError> {
        if operands.is_empty() {
            return Err(ApiError::EmptySelection);
        }
        self.begin(OperationStatus::Creating)?;

        let operands = filter_redundant_descendants(operands);
        let resource_ids: Vec<ResourceId> =
            operands.iter().map(|op| op.resource_id.clone()).collect();

        let kb_id = match self
            .api
            .create_knowledge_base(connection_id, &resource_ids)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.fail("create", &e);
                return Err(e);
            }
        };
        self.publish(OperationStatus::Created);
        tracing::info!(
            knowledge_base_id = %kb_id,
            resources = resource_ids.len(),
            "knowledge base created"
        );

        if let Err(e) = self.cache.add_membership(&resource_ids, &kb_id) {
            let e = ApiError::from(e);
            self.fail("record", &e);
            return Err(e);
        }

        self.publish(OperationStatus::Syncing);
        if let Err(e) = self.api.sync_knowledge_base(&kb_id, organization_id).await {
            self.fail("sync", &e);
            return Err(e);
        }
        self.publish(OperationStatus::Synced);
        tracing::info!(knowledge_base_id = %kb_id, "knowledge base synchronized");

        tokio::time::sleep(self.settle_delay).await;
        self.publish(OperationStatus::Idle);
        Ok(kb_id)
    }

    /// Delete path: remove one resource from a knowledge base remotely, then
    /// drop the local membership.
    pub async fn delete_from_knowledge_base(
        &self,
        kb_id: &KnowledgeBaseId,
        operand: DeleteOperand,
    ) -> Result<(), ApiError> {
        self.begin(OperationStatus::Deleting)?;

        if let Err(e) = self.api.delete_resource(kb_id, &operand.path).await {
            self.fail("delete", &e);
            return Err(e);
        }

        if let Err(e) = self.cache.remove_membership(&operand.resource_id, kb_id) {
            let e = ApiError::from(e);
            self.fail("record", &e);
            return Err(e);
        }
        tracing::info!(
            knowledge_base_id = %kb_id,
            resource_id = %operand.resource_id,
            "resource removed from knowledge base"
        );

        self.publish(OperationStatus::Idle);
        Ok(())
    }
}
