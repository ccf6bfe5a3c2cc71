//! IndexRecord persistence
//!
//! Durable storage seam for the resource cache. The sled-backed store keeps
//! one JSON document per record, keyed by `resource_id`, so a single corrupt
//! entry can be skipped without discarding the rest of the cache.

use crate::cache::IndexRecord;
use crate::error::StorageError;
use crate::types::ResourceId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;

/// Record store interface
pub trait RecordStore: Send + Sync {
    fn load_all(&self) -> Result<HashMap<ResourceId, IndexRecord>, StorageError>;
    fn put(&self, record: &IndexRecord) -> Result<(), StorageError>;
    fn flush(&self) -> Result<(), StorageError>;
}

/// sled-backed record store
pub struct SledRecordStore {
    tree: sled::Tree,
}

const RECORD_TREE: &str = "index-records";

impl SledRecordStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    pub fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let tree = db.open_tree(RECORD_TREE)?;
        Ok(Self { tree })
    }
}

impl RecordStore for SledRecordStore {
    fn load_all(&self) -> Result<HashMap<ResourceId, IndexRecord>, StorageError> {
        let mut records = HashMap::new();
        for entry in self.tree.iter() {
            let (key, value) = entry?;
            let resource_id = String::from_utf8_lossy(&key).to_string();
            match serde_json::from_slice::<IndexRecord>(&value) {
                Ok(record) => {
                    records.insert(resource_id, record);
                }
                Err(e) => {
                    tracing::warn!("Skipping corrupt index record {}: {}", resource_id, e);
                }
            }
        }
        Ok(records)
    }

    fn put(&self, record: &IndexRecord) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(record)?;
        self.tree.insert(record.resource_id.as_bytes(), bytes)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.tree.flush()?;
        Ok(())
    }
}

/// In-memory record store for ephemeral sessions and tests
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<ResourceId, IndexRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed stored state, as if written by an earlier session.
    pub fn with_records(records: HashMap<ResourceId, IndexRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

impl RecordStore for MemoryRecordStore {
    fn load_all(&self) -> Result<HashMap<ResourceId, IndexRecord>, StorageError> {
        Ok(self.records.lock().clone())
    }

    fn put(&self, record: &IndexRecord) -> Result<(), StorageError> {
        self.records
            .lock()
            .insert(record.resource_id.clone(), record.clone());
        Ok(())
    }

    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
