//! Group Membership
//!
//! Groups are read-only inputs to authorization: rule subjects may name a
//! group, and membership in the administrators group bypasses namespace
//! rules altogether. Membership is maintained elsewhere; this core only
//! queries it.

use crate::error::Result;
use crate::types::UserGroup;

use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Source of group membership information.
pub trait GroupSource: Send + Sync {
    fn group_names(&self) -> Result<Vec<String>>;

    fn group(&self, name: &str) -> Result<Option<UserGroup>>;

    /// Names of every group the user belongs to.
    fn groups_for(&self, user_id: &str) -> Result<Vec<String>>;
}

/// In-memory group source, populated at startup or by an embedding server.
#[derive(Debug, Default)]
pub struct StaticGroupSource {
    groups: RwLock<BTreeMap<String, UserGroup>>,
}

impl StaticGroupSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, group: UserGroup) {
        self.groups.write().insert(group.name.clone(), group);
    }

    pub fn remove(&self, name: &str) -> bool {
        self.groups.write().remove(name).is_some()
    }
}

impl GroupSource for StaticGroupSource {
    fn group_names(&self) -> Result<Vec<String>> {
        Ok(self.groups.read().keys().cloned().collect())
    }

    fn group(&self, name: &str) -> Result<Option<UserGroup>> {
        Ok(self.groups.read().get(name).cloned())
    }

    fn groups_for(&self, user_id: &str) -> Result<Vec<String>> {
        Ok(self
            .groups
            .read()
            .values()
            .filter(|g| g.members.contains(user_id))
            .map(|g| g.name.clone())
            .collect())
    }
}
