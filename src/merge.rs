//! Listing Merge
//!
//! Reconciles freshly fetched folder listings into the resource cache. A
//! listing is ground truth for existence and path, never for knowledge-base
//! membership: users must not see their indexed files lose their badge just
//! because a folder was revisited. The merge therefore only creates records
//! and refreshes transient metadata, via `ResourceCache::upsert_metadata`.

use crate::cache::ResourceCache;
use crate::error::StorageError;
use crate::types::Resource;
use std::sync::Arc;

/// Sole write path from navigation into the cache.
pub struct MergeEngine {
    cache: Arc<ResourceCache>,
}

impl MergeEngine {
    pub fn new(cache: Arc<ResourceCache>) -> Self {
        Self { cache }
    }

    pub fn apply(&self, fetched: &[Resource]) -> Result<(), StorageError> {
        let created = fetched
            .iter()
            .filter(|r| self.cache.get(&r.resource_id).is_none())
            .count();
        self.cache.upsert_metadata(fetched)?;
        tracing::debug!(
            total = fetched.len(),
            created,
            refreshed = fetched.len() - created,
            "merged folder listing into cache"
        );
        Ok(())
    }
}
