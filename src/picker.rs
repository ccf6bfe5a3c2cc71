//! Picker session
//!
//! The facade the UI layer consumes. Owns the selection, the knowledge-base
//! scope and the current folder, and wires navigation through the merge
//! engine and user actions through the selection rules and the operation
//! coordinator. The UI renders cache state and calls these methods; nothing
//! else mutates picker state.

use crate::cache::ResourceCache;
use crate::config::PickerConfig;
use crate::coordinator::{
    CreateOperand, DeleteOperand, OperationCoordinator, OperationStatus,
};
use crate::error::ApiError;
use crate::merge::MergeEngine;
use crate::remote::{ConnectionInfo, ConnectorApi};
use crate::selection::{DenyReason, SelectionSet, Toggle};
use crate::types::{KnowledgeBaseId, Resource, ResourceId, NULL_KNOWLEDGE_BASE_ID};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

/// One browsing session over a connector.
pub struct PickerSession<A: ConnectorApi> {
    api: Arc<A>,
    cache: Arc<ResourceCache>,
    merge: MergeEngine,
    coordinator: OperationCoordinator<A>,
    config: PickerConfig,
    connection: Mutex<Option<ConnectionInfo>>,
    selection: Mutex<SelectionSet>,
    scope: Mutex<Option<KnowledgeBaseId>>,
    current_folder: Mutex<Option<ResourceId>>,
}

impl<A: ConnectorApi> PickerSession<A> {
    /// Fails fast on incomplete configuration; the picker cannot run without
    /// connection and organization identifiers.
    pub fn new(
        api: Arc<A>,
        cache: Arc<ResourceCache>,
        config: PickerConfig,
    ) -> Result<Self, ApiError> {
        config.validate()?;
        Ok(Self {
            merge: MergeEngine::new(cache.clone()),
            coordinator: OperationCoordinator::new(api.clone(), cache.clone()),
            api,
            cache,
            config,
            connection: Mutex::new(None),
            selection: Mutex::new(SelectionSet::new()),
            scope: Mutex::new(None),
            current_folder: Mutex::new(None),
        })
    }

    /// Replace the default coordinator, e.g. to shorten the settle delay.
    pub fn with_coordinator(mut self, coordinator: OperationCoordinator<A>) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn status(&self) -> OperationStatus {
        self.coordinator.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<OperationStatus> {
        self.coordinator.subscribe()
    }

    /// Fetch and remember the connection for display purposes.
    pub async fn connect(&self) -> Result<ConnectionInfo, ApiError> {
        let info = self.api.list_connection().await?;
        *self.connection.lock() = Some(info.clone());
        Ok(info)
    }

    pub fn connection(&self) -> Option<ConnectionInfo> {
        self.connection.lock().clone()
    }

    /// Navigate to a folder (`None` = connection root): fetch its children,
    /// merge them into the cache and clear the selection. Fetch failures are
    /// recoverable; the caller surfaces them inline where the listing would
    /// render.
    pub async fn open_folder(
        &self,
        folder_id: Option<ResourceId>,
    ) -> Result<Vec<Resource>, ApiError> {
        let resources = self
            .api
            .list_folder_children(&self.config.connection_id, folder_id.as_ref())
            .await?;
        self.merge.apply(&resources)?;
        self.selection.lock().clear();
        *self.current_folder.lock() = folder_id;
        Ok(resources)
    }

    /// Refetch the folder the session is currently showing, without touching
    /// the selection.
    pub async fn refresh_current_folder(&self) -> Result<Vec<Resource>, ApiError> {
        let folder_id = self.current_folder.lock().clone();
        let resources = self
            .api
            .list_folder_children(&self.config.connection_id, folder_id.as_ref())
            .await?;
        self.merge.apply(&resources)?;
        Ok(resources)
    }

    pub fn current_folder(&self) -> Option<ResourceId> {
        self.current_folder.lock().clone()
    }

    /// Toggle a resource in or out of the selection. A denial carries the
    /// advisory text to show the user; selection state is unchanged by it.
    pub fn toggle_select(&self, resource_id: &ResourceId) -> Result<Toggle, DenyReason> {
        let scope = self.scope.lock().clone();
        self.selection
            .lock()
            .toggle(resource_id, &self.cache, scope.as_ref())
    }

    pub fn selection(&self) -> Vec<ResourceId> {
        self.selection.lock().snapshot()
    }

    /// Cancel the current selection. Refused while an operation is in
    /// flight; its operand list was captured at call time and the cleared
    /// selection would misrepresent what is being created.
    pub fn clear_selection(&self) -> Result<(), ApiError> {
        if self.coordinator.is_busy() {
            return Err(ApiError::OperationInFlight);
        }
        self.selection.lock().clear();
        Ok(())
    }

    /// Switch between the all-files view (`None`) and a view scoped to one
    /// knowledge base. Clears the selection either way; the legacy null
    /// sentinel is treated as "no scope".
    pub fn set_scope(&self, scope: Option<KnowledgeBaseId>) {
        let scope = scope.filter(|kb| kb != NULL_KNOWLEDGE_BASE_ID);
        *self.scope.lock() = scope;
        self.selection.lock().clear();
    }

    pub fn scope(&self) -> Option<KnowledgeBaseId> {
        self.scope.lock().clone()
    }

    /// Knowledge bases known to this client, for the scope picker.
    pub fn known_knowledge_bases(&self) -> Vec<KnowledgeBaseId> {
        self.cache.all_knowledge_base_ids().into_iter().collect()
    }

    /// Create a knowledge base from the current selection and trigger its
    /// sync. All-files view only. The operand list is snapshotted from the
    /// cache before the first remote call; navigating away mid-flight does
    /// not change what gets created. On success the selection is cleared.
    pub async fn create_knowledge_base(&self) -> Result<KnowledgeBaseId, ApiError> {
        if self.scope.lock().is_some() {
            return Err(ApiError::ScopeForbidden);
        }
        let operands: Vec<CreateOperand> = self
            .selection
            .lock()
            .iter()
            .map(|id| {
                let record = self.cache.get(id);
                CreateOperand {
                    resource_id: id.clone(),
                    path: record.as_ref().and_then(|r| r.path.clone()),
                    kind: record.as_ref().and_then(|r| r.kind),
                }
            })
            .collect();
        if operands.is_empty() {
            return Err(ApiError::EmptySelection);
        }

        let kb_id = self
            .coordinator
            .create_and_sync(
                &self.config.connection_id,
                &self.config.organization_id,
                operands,
            )
            .await?;
        self.selection.lock().clear();
        Ok(kb_id)
    }

    /// Remove the single selected resource from the scoped knowledge base,
    /// then clear the selection and refetch the current folder. A failed
    /// refetch after a successful delete surfaces as a recoverable fetch
    /// error; the cache is already consistent.
    pub async fn delete_selected(&self) -> Result<Vec<Resource>, ApiError> {
        let kb_id = self.scope.lock().clone().ok_or(ApiError::ScopeRequired)?;
        let selected = self.selection.lock().snapshot();
        let resource_id = match selected.as_slice() {
            [] => return Err(ApiError::EmptySelection),
            [id] => id.clone(),
            more => return Err(ApiError::SelectionNotSingular(more.len())),
        };
        let path = self
            .cache
            .get(&resource_id)
            .and_then(|r| r.path)
            .ok_or_else(|| ApiError::UnknownResourcePath(resource_id.clone()))?;

        self.coordinator
            .delete_from_knowledge_base(&kb_id, DeleteOperand { resource_id, path })
            .await?;
        self.selection.lock().clear();
        self.refresh_current_folder().await
    }
}
