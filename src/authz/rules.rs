//! Namespace Permission Records
//!
//! One record per namespace node that has explicit rules. Subjects in the
//! grant/deny sets are user ids, group names, or the anonymous wildcard.

use crate::types::{PermissionLevel, Principal, ANONYMOUS_USER_ID};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Grant and deny rules for one namespace node.
///
/// `namespace` is `None` for the global record at the repository root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespacePermissionRecord {
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub grants: BTreeMap<PermissionLevel, BTreeSet<String>>,
    #[serde(default)]
    pub denies: BTreeMap<PermissionLevel, BTreeSet<String>>,
}

impl NamespacePermissionRecord {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    pub fn global() -> Self {
        Self::default()
    }

    /// The record synthesized at bootstrap when no rules exist anywhere:
    /// anonymous may read drafts.
    pub fn default_global() -> Self {
        Self::global().with_grant(PermissionLevel::ReadDraft, ANONYMOUS_USER_ID)
    }

    pub fn with_grant(mut self, level: PermissionLevel, subject: impl Into<String>) -> Self {
        self.grants.entry(level).or_default().insert(subject.into());
        self
    }

    pub fn with_deny(mut self, level: PermissionLevel, subject: impl Into<String>) -> Self {
        self.denies.entry(level).or_default().insert(subject.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.grants.values().all(BTreeSet::is_empty)
            && self.denies.values().all(BTreeSet::is_empty)
    }

    /// Highest-ranked grant at this node applicable to the principal.
    pub fn highest_grant_for(&self, principal: &Principal) -> Option<PermissionLevel> {
        self.grants
            .iter()
            .filter(|(_, subjects)| subjects.iter().any(|s| principal.matches_subject(s)))
            .map(|(level, _)| *level)
            .max()
    }

    /// Lowest-ranked (most restrictive) deny at this node applicable to
    /// the principal.
    pub fn lowest_deny_for(&self, principal: &Principal) -> Option<PermissionLevel> {
        self.denies
            .iter()
            .filter(|(_, subjects)| subjects.iter().any(|s| principal.matches_subject(s)))
            .map(|(level, _)| *level)
            .min()
    }
}
