//! Selection rules
//!
//! A selection must map onto one coherent remote operation: a create call
//! targets exactly one new knowledge base, and a scoped removal targets
//! exactly one resource inside exactly one knowledge base. The validator
//! enforces that before selection state ever changes; a denial is an
//! advisory for the user, not an error.

use crate::cache::ResourceCache;
use crate::types::{KnowledgeBaseId, ResourceId};
use std::collections::BTreeSet;
use std::fmt;

/// Why a candidate was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Scoped view: candidate is not a member of the scoped knowledge base.
    NotInScopedKnowledgeBase,
    /// Candidate's memberships share nothing with the selected resources'.
    DifferentKnowledgeBases,
    /// Indexed and non-indexed resources cannot share a selection.
    MixedIndexedState,
}

impl DenyReason {
    /// User-facing advisory text.
    pub fn advisory(&self) -> &'static str {
        match self {
            DenyReason::NotInScopedKnowledgeBase => "not in selected knowledge base",
            DenyReason::DifferentKnowledgeBases => "different knowledge bases",
            DenyReason::MixedIndexedState => "cannot mix indexed and non-indexed",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.advisory())
    }
}

/// Outcome of validating a candidate against the current selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny(DenyReason),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

/// Decide whether `candidate` may join `selection`.
///
/// Rules in order: scoped views admit only members of the scoped knowledge
/// base; in the all-files view an indexed candidate must share a knowledge
/// base with every already-selected indexed resource, and indexed and
/// non-indexed resources never mix. Deselection is not validated here.
pub fn validate_add(
    candidate: &ResourceId,
    selection: &SelectionSet,
    cache: &ResourceCache,
    scope: Option<&KnowledgeBaseId>,
) -> Verdict {
    if let Some(kb_id) = scope {
        return if cache.membership_of(candidate).contains(kb_id) {
            Verdict::Allow
        } else {
            Verdict::Deny(DenyReason::NotInScopedKnowledgeBase)
        };
    }

    let candidate_kbs = cache.membership_of(candidate);
    let selected_union: BTreeSet<KnowledgeBaseId> = selection
        .iter()
        .flat_map(|id| cache.membership_of(id))
        .collect();
    let selection_has_indexed = !selected_union.is_empty();

    if candidate_kbs.is_empty() {
        if selection_has_indexed {
            return Verdict::Deny(DenyReason::MixedIndexedState);
        }
        return Verdict::Allow;
    }

    if selection.iter().any(|id| !cache.is_indexed(id)) {
        return Verdict::Deny(DenyReason::MixedIndexedState);
    }

    if selection_has_indexed && candidate_kbs.is_disjoint(&selected_union) {
        return Verdict::Deny(DenyReason::DifferentKnowledgeBases);
    }

    Verdict::Allow
}

/// Result of a toggle that went through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Added,
    /// Scoped views cap the selection at one; adding replaces.
    Replaced,
    Removed,
}

/// Transient, session-scoped set of selected resource ids. Never persisted;
/// cleared on navigation, on cancel and after a completed operation.
#[derive(Debug, Default, Clone)]
pub struct SelectionSet {
    ids: BTreeSet<ResourceId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, resource_id: &str) -> bool {
        self.ids.contains(resource_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceId> {
        self.ids.iter()
    }

    pub fn snapshot(&self) -> Vec<ResourceId> {
        self.ids.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Toggle one resource. Removal is always allowed; addition goes through
    /// the validator, and under a scope replaces the previous selection.
    pub fn toggle(
        &mut self,
        resource_id: &ResourceId,
        cache: &ResourceCache,
        scope: Option<&KnowledgeBaseId>,
    ) -> Result<Toggle, DenyReason> {
        if self.ids.remove(resource_id) {
            return Ok(Toggle::Removed);
        }
        match validate_add(resource_id, self, cache, scope) {
            Verdict::Deny(reason) => Err(reason),
            Verdict::Allow => {
                if scope.is_some() && !self.ids.is_empty() {
                    self.ids.clear();
                    self.ids.insert(resource_id.clone());
                    Ok(Toggle::Replaced)
                } else {
                    self.ids.insert(resource_id.clone());
                    Ok(Toggle::Added)
                }
            }
        }
    }
}
