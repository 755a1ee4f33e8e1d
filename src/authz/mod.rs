//! Namespace Authorization
//!
//! Grant/deny records are attached to nodes of the namespace hierarchy;
//! the resolver walks a namespace's ancestor chain from the global root
//! down to the namespace itself and folds the applicable rules into one
//! effective permission level.

pub mod hierarchy;
pub mod resolver;
pub mod rules;
pub mod storage;

pub use hierarchy::hierarchy_keys;
pub use resolver::NamespaceAuthorizationResolver;
pub use rules::NamespacePermissionRecord;
pub use storage::{FilePermissionStore, PermissionStore};

use crate::error::Result;
use crate::types::{PermissionLevel, Principal};

/// Resolves a principal's effective permission for a namespace.
pub trait AuthorizationProvider: Send + Sync {
    /// Effective permission of `principal` on `namespace`, or `None` when
    /// nothing in the hierarchy grants access.
    fn resolve(&self, principal: &Principal, namespace: &str) -> Result<Option<PermissionLevel>>;
}
