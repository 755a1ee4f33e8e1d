//! Authorization Resolver
//!
//! Walks a namespace's ancestor chain from the global root down and folds
//! the per-node grant/deny rules into one effective permission level.
//! Grants accumulate (the broadest grant seen so far wins) while a deny
//! at a node immediately downgrades whatever has been accumulated. Denies
//! never turn into grants: a principal nothing grants access to stays
//! without access no matter what the denies say.

use super::hierarchy::hierarchy_keys;
use super::rules::NamespacePermissionRecord;
use super::storage::PermissionStore;
use super::AuthorizationProvider;
use crate::error::Result;
use crate::metrics::SecurityMetrics;
use crate::types::{PermissionLevel, Principal};

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Resolves effective permissions against the namespace hierarchy.
///
/// Records are cached per node after first load; the cache key `None`
/// is the global root. Writes go through [`store_record`] so the cache
/// never serves a stale record after a local mutation.
///
/// [`store_record`]: NamespaceAuthorizationResolver::store_record
pub struct NamespaceAuthorizationResolver {
    store: Arc<dyn PermissionStore>,
    cache: DashMap<Option<String>, Option<NamespacePermissionRecord>>,
    metrics: Arc<SecurityMetrics>,
}

impl NamespaceAuthorizationResolver {
    /// Build a resolver over a permission store. A store that has never
    /// held any record is bootstrapped with the default global record so
    /// a fresh repository is readable.
    pub fn new(store: Arc<dyn PermissionStore>, metrics: Arc<SecurityMetrics>) -> Result<Self> {
        if !store.has_any_records()? {
            let record = NamespacePermissionRecord::default_global();
            store.save(&record)?;
            info!("no permission records found, bootstrapped default global record");
        }
        Ok(Self {
            store,
            cache: DashMap::new(),
            metrics,
        })
    }

    fn record_for(&self, namespace: Option<&str>) -> Result<Option<NamespacePermissionRecord>> {
        let key = namespace.map(str::to_string);
        if let Some(cached) = self.cache.get(&key) {
            self.metrics.record_record_cache_hit();
            return Ok(cached.clone());
        }
        self.metrics.record_record_cache_miss();
        let record = self.store.load(namespace)?;
        self.cache.insert(key, record.clone());
        Ok(record)
    }

    /// The record attached to one namespace node, if any.
    pub fn get_record(&self, namespace: Option<&str>) -> Result<Option<NamespacePermissionRecord>> {
        self.record_for(namespace)
    }

    /// Persist a record and refresh the cached copy.
    pub fn store_record(&self, record: NamespacePermissionRecord) -> Result<()> {
        self.store.save(&record)?;
        self.cache
            .insert(record.namespace.clone(), Some(record));
        Ok(())
    }

    fn apply_deny(
        granted: Option<PermissionLevel>,
        deny: PermissionLevel,
    ) -> Option<PermissionLevel> {
        let current = granted?;
        match deny {
            // Denying the lowest level removes access entirely.
            PermissionLevel::ReadFinal => None,
            // Any held level is at least ReadFinal, so the cap always applies.
            PermissionLevel::ReadDraft => Some(PermissionLevel::ReadFinal),
            PermissionLevel::Write => {
                if current == PermissionLevel::Write {
                    Some(PermissionLevel::ReadDraft)
                } else {
                    Some(current)
                }
            }
        }
    }
}

impl AuthorizationProvider for NamespaceAuthorizationResolver {
    fn resolve(&self, principal: &Principal, namespace: &str) -> Result<Option<PermissionLevel>> {
        let mut granted: Option<PermissionLevel> = None;

        for key in hierarchy_keys(namespace)? {
            let Some(record) = self.record_for(key.as_deref())? else {
                continue;
            };

            if let Some(grant) = record.highest_grant_for(principal) {
                if granted.map(|g| grant > g).unwrap_or(true) {
                    granted = Some(grant);
                }
            }
            if let Some(deny) = record.lowest_deny_for(principal) {
                granted = Self::apply_deny(granted, deny);
            }
        }

        debug!(
            user = %principal.user_id,
            namespace = %namespace,
            effective = ?granted,
            "resolved namespace permission"
        );
        Ok(granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::storage::FilePermissionStore;
    use crate::types::ANONYMOUS_USER_ID;

    fn new_resolver(dir: &tempfile::TempDir) -> NamespaceAuthorizationResolver {
        NamespaceAuthorizationResolver::new(
            Arc::new(FilePermissionStore::new(dir.path())),
            Arc::new(SecurityMetrics::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_bootstrap_grants_anonymous_draft_read() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = new_resolver(&dir);

        let anyone = Principal::new("anyone");
        assert_eq!(
            resolver.resolve(&anyone, "http://example.org/ns").unwrap(),
            Some(PermissionLevel::ReadDraft)
        );
    }

    #[test]
    fn test_bootstrap_skipped_when_records_exist() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FilePermissionStore::new(dir.path()));
        store
            .save(&NamespacePermissionRecord::new("http://example.org/ns"))
            .unwrap();

        let resolver = NamespaceAuthorizationResolver::new(
            store.clone(),
            Arc::new(SecurityMetrics::new()),
        )
        .unwrap();
        assert!(resolver.get_record(None).unwrap().is_none());
    }

    #[test]
    fn test_more_specific_deny_downgrades_write() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = new_resolver(&dir);

        resolver
            .store_record(
                NamespacePermissionRecord::new("http://example.org/ns")
                    .with_grant(PermissionLevel::Write, "alice"),
            )
            .unwrap();
        resolver
            .store_record(
                NamespacePermissionRecord::new("http://example.org/ns/sub")
                    .with_deny(PermissionLevel::Write, "alice"),
            )
            .unwrap();

        let alice = Principal::new("alice");
        assert_eq!(
            resolver.resolve(&alice, "http://example.org/ns").unwrap(),
            Some(PermissionLevel::Write)
        );
        assert_eq!(
            resolver
                .resolve(&alice, "http://example.org/ns/sub")
                .unwrap(),
            Some(PermissionLevel::ReadDraft)
        );
        assert_eq!(
            resolver
                .resolve(&alice, "http://example.org/ns/sub/deeper")
                .unwrap(),
            Some(PermissionLevel::ReadDraft)
        );
    }

    #[test]
    fn test_deny_never_blocks_the_ungranted() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = new_resolver(&dir);

        resolver
            .store_record(
                NamespacePermissionRecord::new("http://example.org/ns")
                    .with_deny(PermissionLevel::ReadFinal, "bob"),
            )
            .unwrap();
        resolver
            .store_record(
                NamespacePermissionRecord::new("http://example.org/ns/sub")
                    .with_grant(PermissionLevel::Write, "bob"),
            )
            .unwrap();

        // The deny sits above the grant, so it applies to nothing bob
        // holds at that point in the walk.
        let bob = Principal::new("bob");
        assert_eq!(
            resolver
                .resolve(&bob, "http://example.org/ns/sub")
                .unwrap(),
            Some(PermissionLevel::Write)
        );
    }

    #[test]
    fn test_deny_read_final_removes_access() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = new_resolver(&dir);

        resolver
            .store_record(
                NamespacePermissionRecord::new("http://example.org/ns")
                    .with_grant(PermissionLevel::Write, "alice"),
            )
            .unwrap();
        resolver
            .store_record(
                NamespacePermissionRecord::new("http://example.org/ns/secret")
                    .with_deny(PermissionLevel::ReadFinal, "alice"),
            )
            .unwrap();

        let alice = Principal::new("alice");
        assert_eq!(
            resolver
                .resolve(&alice, "http://example.org/ns/secret")
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_deny_read_draft_caps_at_read_final() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = new_resolver(&dir);

        resolver
            .store_record(
                NamespacePermissionRecord::new("http://example.org/ns")
                    .with_grant(PermissionLevel::Write, "alice"),
            )
            .unwrap();
        resolver
            .store_record(
                NamespacePermissionRecord::new("http://example.org/ns/released")
                    .with_deny(PermissionLevel::ReadDraft, "alice"),
            )
            .unwrap();

        let alice = Principal::new("alice");
        assert_eq!(
            resolver
                .resolve(&alice, "http://example.org/ns/released")
                .unwrap(),
            Some(PermissionLevel::ReadFinal)
        );
    }

    #[test]
    fn test_deny_read_draft_leaves_final_access_intact() {
        let dir = tempfile::tempdir().unwrap();
        // An explicit empty global record suppresses the bootstrap grant.
        let store = Arc::new(FilePermissionStore::new(dir.path()));
        store.save(&NamespacePermissionRecord::global()).unwrap();
        let resolver =
            NamespaceAuthorizationResolver::new(store, Arc::new(SecurityMetrics::new())).unwrap();

        resolver
            .store_record(
                NamespacePermissionRecord::new("http://example.org/ns")
                    .with_grant(PermissionLevel::ReadFinal, "alice"),
            )
            .unwrap();
        resolver
            .store_record(
                NamespacePermissionRecord::new("http://example.org/ns/sub")
                    .with_deny(PermissionLevel::ReadDraft, "alice"),
            )
            .unwrap();

        let alice = Principal::new("alice");
        assert_eq!(
            resolver
                .resolve(&alice, "http://example.org/ns/sub")
                .unwrap(),
            Some(PermissionLevel::ReadFinal)
        );
    }

    #[test]
    fn test_group_grant_applies_to_members() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = new_resolver(&dir);

        resolver
            .store_record(
                NamespacePermissionRecord::new("http://example.org/ns")
                    .with_grant(PermissionLevel::Write, "editors"),
            )
            .unwrap();

        let member = Principal::new("carol").with_groups(vec!["editors".to_string()]);
        let outsider = Principal::new("dave");
        assert_eq!(
            resolver.resolve(&member, "http://example.org/ns").unwrap(),
            Some(PermissionLevel::Write)
        );
        // Outsiders still hold the bootstrap anonymous grant.
        assert_eq!(
            resolver
                .resolve(&outsider, "http://example.org/ns")
                .unwrap(),
            Some(PermissionLevel::ReadDraft)
        );
    }

    #[test]
    fn test_anonymous_deny_applies_to_everyone() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = new_resolver(&dir);

        resolver
            .store_record(
                NamespacePermissionRecord::new("http://example.org/private")
                    .with_deny(PermissionLevel::ReadFinal, ANONYMOUS_USER_ID)
                    .with_grant(PermissionLevel::Write, "owner"),
            )
            .unwrap();

        let stranger = Principal::new("stranger");
        assert_eq!(
            resolver
                .resolve(&stranger, "http://example.org/private")
                .unwrap(),
            None
        );
        // The owner's grant is applied before the deny at the same node,
        // and the ReadFinal deny wipes it too.
        let owner = Principal::new("owner");
        assert_eq!(
            resolver
                .resolve(&owner, "http://example.org/private")
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_invalid_namespace_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = new_resolver(&dir);
        assert!(resolver
            .resolve(&Principal::new("alice"), "not a uri")
            .is_err());
    }

    #[test]
    fn test_records_are_cached_after_first_load() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = Arc::new(SecurityMetrics::new());
        let resolver = NamespaceAuthorizationResolver::new(
            Arc::new(FilePermissionStore::new(dir.path())),
            metrics.clone(),
        )
        .unwrap();

        let alice = Principal::new("alice");
        resolver.resolve(&alice, "http://example.org/ns").unwrap();
        let misses_after_first = metrics.snapshot().record_cache_misses;
        resolver.resolve(&alice, "http://example.org/ns").unwrap();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.record_cache_misses, misses_after_first);
        assert!(snapshot.record_cache_hits > 0);
    }
}
