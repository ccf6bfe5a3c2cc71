//! Core types for the knoll indexing state engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ResourceId: opaque stable identifier assigned to a node by the remote connector
pub type ResourceId = String;

/// KnowledgeBaseId: identifier of a remote knowledge base
pub type KnowledgeBaseId = String;

/// Legacy sentinel meaning "no knowledge base". Stored state written by older
/// clients may carry it; it is stripped on load and must never surface as a
/// membership.
pub const NULL_KNOWLEDGE_BASE_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Kind of a remote file-tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    File,
    Directory,
}

/// Resource: a node in the remote file tree as returned by a folder listing.
///
/// Parent/child relations are implicit in the slash-delimited `path`; there
/// are no explicit tree pointers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub resource_id: ResourceId,
    pub path: String,
    pub kind: ResourceKind,
    pub size: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl Resource {
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, ResourceKind::Directory)
    }
}

/// True when `path` is a strict descendant of `ancestor` by path prefix:
/// `path` starts with `ancestor` followed by a `/` separator.
///
/// Ancestry is defined purely on path strings; remote paths are the
/// authority, never a locally constructed tree.
pub fn is_strict_descendant(ancestor: &str, path: &str) -> bool {
    let ancestor = ancestor.trim_end_matches('/');
    path.len() > ancestor.len() + 1
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descendant_requires_separator() {
        assert!(is_strict_descendant("/docs", "/docs/readme.txt"));
        assert!(is_strict_descendant("/docs", "/docs/sub/deep.txt"));
        assert!(!is_strict_descendant("/docs", "/docs"));
        assert!(!is_strict_descendant("/docs", "/docs-archive/readme.txt"));
    }

    #[test]
    fn trailing_slash_on_ancestor_is_ignored() {
        assert!(is_strict_descendant("/docs/", "/docs/readme.txt"));
        assert!(!is_strict_descendant("/docs/", "/docs"));
    }
}
