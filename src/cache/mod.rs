//! Resource Cache
//!
//! Persistent per-resource knowledge-base membership. The cache is the single
//! source of truth for "is this resource indexed, and in which knowledge
//! bases" across sessions; folder listings refresh its metadata but never its
//! membership.

pub mod persistence;

use crate::error::StorageError;
use crate::types::{
    is_strict_descendant, KnowledgeBaseId, Resource, ResourceId, ResourceKind,
    NULL_KNOWLEDGE_BASE_ID,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use persistence::{MemoryRecordStore, RecordStore, SledRecordStore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

/// Derived indexing state of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    Resource,
    Indexed,
}

impl Default for IndexStatus {
    fn default() -> Self {
        IndexStatus::Resource
    }
}

/// IndexRecord: cached state for one remote resource.
///
/// `kind` and `path` are unknown when the record was created by a membership
/// write before the resource was ever listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    pub resource_id: ResourceId,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub kind: Option<ResourceKind>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub knowledge_base_ids: BTreeSet<KnowledgeBaseId>,
    #[serde(default)]
    pub status: IndexStatus,
    #[serde(default)]
    pub indexed_directory: bool,
}

impl IndexRecord {
    fn unseen(resource_id: ResourceId) -> Self {
        Self {
            resource_id,
            path: None,
            kind: None,
            size: None,
            last_modified: None,
            knowledge_base_ids: BTreeSet::new(),
            status: IndexStatus::Resource,
            indexed_directory: false,
        }
    }

    fn recompute_status(&mut self) {
        self.status = if self.knowledge_base_ids.is_empty() {
            IndexStatus::Resource
        } else {
            IndexStatus::Indexed
        };
    }

    /// Strip the legacy null sentinel and recompute derived state. Stored
    /// state from older clients used the sentinel to mean "not indexed".
    fn sanitize(&mut self) {
        self.knowledge_base_ids
            .remove(NULL_KNOWLEDGE_BASE_ID);
        self.recompute_status();
        if self.knowledge_base_ids.is_empty() {
            self.indexed_directory = false;
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.status == IndexStatus::Indexed
    }
}

/// Resource cache backed by a durable record store.
///
/// All mutations persist the touched records before the write lock is
/// released; the in-memory map is authoritative for the session.
pub struct ResourceCache {
    records: RwLock<HashMap<ResourceId, IndexRecord>>,
    store: Arc<dyn RecordStore>,
}

impl ResourceCache {
    /// Open a cache persisted under `path`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let store = SledRecordStore::open(path)?;
        Ok(Self::with_store(Arc::new(store)))
    }

    /// Cache with no durable backing; state lives for the session only.
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(MemoryRecordStore::new()))
    }

    /// Load the cache from an existing store. Unreadable stored state is not
    /// fatal: the session starts from an empty map.
    pub fn with_store(store: Arc<dyn RecordStore>) -> Self {
        let mut records = store.load_all().unwrap_or_else(|e| {
            tracing::warn!(
                "Failed to load index records from store: {}, starting with empty cache",
                e
            );
            HashMap::new()
        });
        for record in records.values_mut() {
            record.sanitize();
        }
        Self {
            records: RwLock::new(records),
            store,
        }
    }

    pub fn get(&self, resource_id: &str) -> Option<IndexRecord> {
        self.records.read().get(resource_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Create records for unseen resources and refresh transient metadata for
    /// known ones. Membership, status and the indexed-directory flag are
    /// never touched here; listings are ground truth for existence and path
    /// only.
    pub fn upsert_metadata(&self, resources: &[Resource]) -> Result<(), StorageError> {
        let mut records = self.records.write();
        for resource in resources {
            let record = records
                .entry(resource.resource_id.clone())
                .or_insert_with(|| IndexRecord::unseen(resource.resource_id.clone()));
            record.path = Some(resource.path.clone());
            record.kind = Some(resource.kind);
            record.size = resource.size;
            record.last_modified = resource.last_modified;
            self.store.put(record)?;
        }
        self.store.flush()?;
        Ok(())
    }

    /// Add `kb_id` to the membership of every listed resource. Idempotent on
    /// the set. Directory records additionally get `indexed_directory` set;
    /// that flag is only ever written here, never inferred from children.
    pub fn add_membership(
        &self,
        resource_ids: &[ResourceId],
        kb_id: &KnowledgeBaseId,
    ) -> Result<(), StorageError> {
        if kb_id == NULL_KNOWLEDGE_BASE_ID {
            tracing::warn!("Refusing to record membership in the null knowledge base");
            return Ok(());
        }
        let mut records = self.records.write();
        for resource_id in resource_ids {
            let record = records
                .entry(resource_id.clone())
                .or_insert_with(|| IndexRecord::unseen(resource_id.clone()));
            record.knowledge_base_ids.insert(kb_id.clone());
            if record.kind == Some(ResourceKind::Directory) {
                record.indexed_directory = true;
            }
            record.recompute_status();
            self.store.put(record)?;
        }
        self.store.flush()?;
        Ok(())
    }

    /// Remove `kb_id` from one resource's membership. A record whose set
    /// becomes empty drops back to plain resource status and, for
    /// directories, loses the indexed-directory flag. The record itself is
    /// never deleted.
    pub fn remove_membership(
        &self,
        resource_id: &str,
        kb_id: &KnowledgeBaseId,
    ) -> Result<(), StorageError> {
        let mut records = self.records.write();
        if let Some(record) = records.get_mut(resource_id) {
            record.knowledge_base_ids.remove(kb_id);
            record.recompute_status();
            if record.knowledge_base_ids.is_empty() {
                record.indexed_directory = false;
            }
            self.store.put(record)?;
            self.store.flush()?;
        }
        Ok(())
    }

    pub fn is_indexed(&self, resource_id: &str) -> bool {
        self.records
            .read()
            .get(resource_id)
            .map(IndexRecord::is_indexed)
            .unwrap_or(false)
    }

    /// Knowledge bases the resource belongs to. Empty set for unknown or
    /// unindexed resources; the null sentinel never appears.
    pub fn membership_of(&self, resource_id: &str) -> BTreeSet<KnowledgeBaseId> {
        self.records
            .read()
            .get(resource_id)
            .map(|r| {
                r.knowledge_base_ids
                    .iter()
                    .filter(|kb| kb.as_str() != NULL_KNOWLEDGE_BASE_ID)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Union of memberships across all records, sentinel excluded.
    pub fn all_knowledge_base_ids(&self) -> BTreeSet<KnowledgeBaseId> {
        self.records
            .read()
            .values()
            .flat_map(|r| r.knowledge_base_ids.iter())
            .filter(|kb| kb.as_str() != NULL_KNOWLEDGE_BASE_ID)
            .cloned()
            .collect()
    }

    /// True if any indexed record sits at `path` or below it.
    pub fn path_has_indexed_descendant(&self, path: &str) -> bool {
        let records = self.records.read();
        records.values().any(|record| {
            record.is_indexed()
                && record
                    .path
                    .as_deref()
                    .map(|p| p == path || is_strict_descendant(path, p))
                    .unwrap_or(false)
        })
    }

    /// True only for directories explicitly included in a knowledge-base
    /// creation, independent of whether descendant files are indexed.
    pub fn is_directory_indexed(&self, resource_id: &str) -> bool {
        self.records
            .read()
            .get(resource_id)
            .map(|r| r.kind == Some(ResourceKind::Directory) && r.indexed_directory)
            .unwrap_or(false)
    }

    /// All records belonging to one knowledge base.
    pub fn records_in_knowledge_base(&self, kb_id: &KnowledgeBaseId) -> Vec<IndexRecord> {
        self.records
            .read()
            .values()
            .filter(|r| r.knowledge_base_ids.contains(kb_id))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn file(id: &str, path: &str) -> Resource {
        Resource {
            resource_id: id.to_string(),
            path: path.to_string(),
            kind: ResourceKind::File,
            size: Some(1),
            last_modified: None,
        }
    }

    fn directory(id: &str, path: &str) -> Resource {
        Resource {
            resource_id: id.to_string(),
            path: path.to_string(),
            kind: ResourceKind::Directory,
            size: None,
            last_modified: None,
        }
    }

    #[test]
    fn upsert_creates_unseen_records_with_empty_membership() {
        let cache = ResourceCache::in_memory();
        cache.upsert_metadata(&[file("r1", "/a.txt")]).unwrap();

        let record = cache.get("r1").unwrap();
        assert!(record.knowledge_base_ids.is_empty());
        assert_eq!(record.status, IndexStatus::Resource);
        assert_eq!(record.path.as_deref(), Some("/a.txt"));
    }

    #[test]
    fn upsert_preserves_membership_and_refreshes_metadata() {
        let cache = ResourceCache::in_memory();
        cache.upsert_metadata(&[file("r1", "/a.txt")]).unwrap();
        cache
            .add_membership(&["r1".to_string()], &"kb1".to_string())
            .unwrap();

        let mut refreshed = file("r1", "/renamed.txt");
        refreshed.size = Some(99);
        cache.upsert_metadata(&[refreshed]).unwrap();

        let record = cache.get("r1").unwrap();
        assert!(record.knowledge_base_ids.contains("kb1"));
        assert_eq!(record.status, IndexStatus::Indexed);
        assert_eq!(record.path.as_deref(), Some("/renamed.txt"));
        assert_eq!(record.size, Some(99));
    }

    #[test]
    fn add_membership_is_idempotent() {
        let cache = ResourceCache::in_memory();
        let ids = vec!["r1".to_string()];
        cache.add_membership(&ids, &"kb1".to_string()).unwrap();
        cache.add_membership(&ids, &"kb1".to_string()).unwrap();

        assert_eq!(cache.membership_of("r1").len(), 1);
        assert!(cache.is_indexed("r1"));
    }

    #[test]
    fn add_membership_creates_record_with_unknown_kind() {
        let cache = ResourceCache::in_memory();
        cache
            .add_membership(&["r1".to_string()], &"kb1".to_string())
            .unwrap();

        let record = cache.get("r1").unwrap();
        assert_eq!(record.kind, None);
        assert!(!record.indexed_directory);
        assert!(record.is_indexed());
    }

    #[test]
    fn directories_get_the_indexed_directory_flag() {
        let cache = ResourceCache::in_memory();
        cache.upsert_metadata(&[directory("d1", "/docs")]).unwrap();
        cache
            .add_membership(&["d1".to_string()], &"kb1".to_string())
            .unwrap();

        assert!(cache.is_directory_indexed("d1"));

        cache.remove_membership("d1", &"kb1".to_string()).unwrap();
        assert!(!cache.is_directory_indexed("d1"));
        assert!(!cache.is_indexed("d1"));
    }

    #[test]
    fn remove_membership_keeps_record_and_other_memberships() {
        let cache = ResourceCache::in_memory();
        let ids = vec!["r1".to_string()];
        cache.add_membership(&ids, &"kb1".to_string()).unwrap();
        cache.add_membership(&ids, &"kb2".to_string()).unwrap();

        cache.remove_membership("r1", &"kb1".to_string()).unwrap();
        assert!(cache.is_indexed("r1"));
        assert_eq!(cache.membership_of("r1"), ["kb2".to_string()].into());

        cache.remove_membership("r1", &"kb2".to_string()).unwrap();
        assert!(cache.get("r1").is_some());
        assert!(!cache.is_indexed("r1"));
    }

    #[test]
    fn null_sentinel_membership_is_refused() {
        let cache = ResourceCache::in_memory();
        cache
            .add_membership(&["r1".to_string()], &NULL_KNOWLEDGE_BASE_ID.to_string())
            .unwrap();
        assert!(!cache.is_indexed("r1"));
        assert!(cache.all_knowledge_base_ids().is_empty());
    }

    #[test]
    fn legacy_sentinel_in_stored_state_is_sanitized_on_load() {
        let mut record = IndexRecord::unseen("r1".to_string());
        record.kind = Some(ResourceKind::Directory);
        record
            .knowledge_base_ids
            .insert(NULL_KNOWLEDGE_BASE_ID.to_string());
        record.status = IndexStatus::Indexed;
        record.indexed_directory = true;

        let store = MemoryRecordStore::with_records(
            [("r1".to_string(), record)].into_iter().collect(),
        );
        let cache = ResourceCache::with_store(Arc::new(store));

        assert!(!cache.is_indexed("r1"));
        assert!(!cache.is_directory_indexed("r1"));
        assert!(cache.membership_of("r1").is_empty());
        assert!(cache.all_knowledge_base_ids().is_empty());
    }

    #[test]
    fn indexed_descendant_query_uses_path_prefix() {
        let cache = ResourceCache::in_memory();
        cache
            .upsert_metadata(&[file("r1", "/docs/guide/intro.md"), file("r2", "/docsx/a.md")])
            .unwrap();
        cache
            .add_membership(&["r1".to_string(), "r2".to_string()], &"kb1".to_string())
            .unwrap();

        assert!(cache.path_has_indexed_descendant("/docs"));
        assert!(cache.path_has_indexed_descendant("/docs/guide"));
        assert!(cache.path_has_indexed_descendant("/docs/guide/intro.md"));
        assert!(!cache.path_has_indexed_descendant("/doc"));
        assert!(!cache.path_has_indexed_descendant("/other"));
    }

    #[test]
    fn records_are_listable_by_knowledge_base() {
        let cache = ResourceCache::in_memory();
        cache
            .upsert_metadata(&[file("r1", "/a.txt"), file("r2", "/b.txt"), file("r3", "/c.txt")])
            .unwrap();
        cache
            .add_membership(&["r1".to_string(), "r2".to_string()], &"kb1".to_string())
            .unwrap();
        cache
            .add_membership(&["r3".to_string()], &"kb2".to_string())
            .unwrap();

        let mut in_kb1: Vec<String> = cache
            .records_in_knowledge_base(&"kb1".to_string())
            .into_iter()
            .map(|r| r.resource_id)
            .collect();
        in_kb1.sort();
        assert_eq!(in_kb1, vec!["r1".to_string(), "r2".to_string()]);

        assert_eq!(
            cache.all_knowledge_base_ids(),
            ["kb1".to_string(), "kb2".to_string()].into()
        );
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn unreadable_store_falls_back_to_empty_cache() {
        struct BrokenStore;
        impl RecordStore for BrokenStore {
            fn load_all(&self) -> Result<HashMap<ResourceId, IndexRecord>, StorageError> {
                Err(StorageError::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk on fire",
                )))
            }
            fn put(&self, _record: &IndexRecord) -> Result<(), StorageError> {
                Ok(())
            }
            fn flush(&self) -> Result<(), StorageError> {
                Ok(())
            }
        }

        let cache = ResourceCache::with_store(Arc::new(BrokenStore));
        assert!(cache.is_empty());
    }

    #[test]
    fn membership_survives_reopen_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache");

        {
            let cache = ResourceCache::open(&path).unwrap();
            cache.upsert_metadata(&[file("r1", "/a.txt")]).unwrap();
            cache
                .add_membership(&["r1".to_string()], &"kb1".to_string())
                .unwrap();
        }

        let cache = ResourceCache::open(&path).unwrap();
        assert!(cache.is_indexed("r1"));
        assert_eq!(cache.membership_of("r1"), ["kb1".to_string()].into());
    }

    proptest! {
        /// Refreshing metadata from a listing never disturbs membership,
        /// whatever the new size or timestamp.
        #[test]
        fn merge_refresh_preserves_membership(
            size in proptest::option::of(0u64..1_000_000),
            secs in 0i64..2_000_000_000,
            path in "/[a-z]{1,12}/[a-z]{1,12}"
        ) {
            let cache = ResourceCache::in_memory();
            cache.upsert_metadata(&[file("r1", "/orig.txt")]).unwrap();
            cache.add_membership(&["r1".to_string()], &"kb1".to_string()).unwrap();

            let refreshed = Resource {
                resource_id: "r1".to_string(),
                path,
                kind: ResourceKind::File,
                size,
                last_modified: chrono::DateTime::from_timestamp(secs, 0),
            };
            cache.upsert_metadata(&[refreshed.clone()]).unwrap();

            let record = cache.get("r1").unwrap();
            prop_assert!(record.knowledge_base_ids.contains("kb1"));
            prop_assert_eq!(record.status, IndexStatus::Indexed);
            prop_assert_eq!(record.path.as_deref(), Some(refreshed.path.as_str()));
            prop_assert_eq!(record.size, refreshed.size);
        }
    }
}
