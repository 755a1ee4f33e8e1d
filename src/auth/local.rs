//! Local Account Store
//!
//! The default `AuthenticationProvider`: CRUD over a persisted, sorted
//! list of user records with an in-memory registry refreshed by comparing
//! the backing store's modification time against a last-seen watermark.
//!
//! All registry access, the check-then-reload included, happens under a
//! single mutex so readers never observe a half-reloaded registry. Every
//! mutation rewrites the whole persisted list atomically and only swaps
//! the registry after the write succeeded.

use super::{matches_criteria, validate_user_record, AuthenticationProvider, SecretDigester, UserStore};
use crate::config::LocalStoreConfig;
use crate::error::{Result, SecurityError};
use crate::metrics::SecurityMetrics;
use crate::types::UserRecord;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

struct Registry {
    users: Vec<UserRecord>,
    watermark: Option<SystemTime>,
}

pub struct LocalAccountStore {
    store: Arc<dyn UserStore>,
    digester: SecretDigester,
    registry: Mutex<Registry>,
    metrics: Arc<SecurityMetrics>,
}

impl LocalAccountStore {
    pub fn new(
        config: &LocalStoreConfig,
        store: Arc<dyn UserStore>,
        metrics: Arc<SecurityMetrics>,
    ) -> Self {
        Self {
            store,
            digester: SecretDigester::new(config.digest_algorithm, config.digest_encoding),
            registry: Mutex::new(Registry {
                users: Vec::new(),
                watermark: None,
            }),
            metrics,
        }
    }

    /// Reload the registry when the backing store is newer than the
    /// watermark. Must be called with the registry lock held.
    fn refresh(&self, registry: &mut Registry) -> Result<()> {
        let modified = self.store.last_modified()?;
        let stale = match (modified, registry.watermark) {
            (Some(modified), Some(watermark)) => modified > watermark,
            (Some(_), None) => true,
            (None, _) => registry.watermark.is_some() || registry.users.is_empty(),
        };
        if stale {
            let mut users = self.store.load()?;
            users.sort();
            debug!(count = users.len(), "reloaded user registry");
            registry.users = users;
            registry.watermark = modified;
        }
        Ok(())
    }

    /// Apply a mutation to a copy of the current list, persist it, and
    /// swap the registry only on success.
    fn mutate<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<UserRecord>) -> Result<()>,
    {
        let mut registry = self.registry.lock();
        self.refresh(&mut registry)?;

        let mut users = registry.users.clone();
        apply(&mut users)?;
        users.sort();

        // A failed save leaves the prior persisted state committed and the
        // registry untouched.
        self.store.save(&users)?;
        registry.users = users;
        // The watermark is cleared rather than read back from the store: an
        // external write landing between the save and a stat would be
        // absorbed into it and masked. The next read reloads from disk.
        registry.watermark = None;
        Ok(())
    }
}

impl AuthenticationProvider for LocalAccountStore {
    fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let mut registry = self.registry.lock();
        self.refresh(&mut registry)?;
        Ok(registry.users.iter().find(|u| u.user_id == user_id).cloned())
    }

    fn get_all_users(&self) -> Result<Vec<UserRecord>> {
        let mut registry = self.registry.lock();
        self.refresh(&mut registry)?;
        Ok(registry.users.clone())
    }

    fn search_candidate_users(
        &self,
        criteria: &str,
        max_results: usize,
    ) -> Result<Vec<UserRecord>> {
        let mut registry = self.registry.lock();
        self.refresh(&mut registry)?;
        Ok(registry
            .users
            .iter()
            .filter(|u| matches_criteria(u, criteria))
            .take(max_results)
            .cloned()
            .collect())
    }

    fn add_user(&self, record: UserRecord) -> Result<()> {
        validate_user_record(&record)?;
        self.mutate(|users| {
            if users.iter().any(|u| u.user_id == record.user_id) {
                return Err(SecurityError::DuplicateUser(record.user_id.clone()));
            }
            users.push(record);
            Ok(())
        })
    }

    fn update_user(&self, record: UserRecord) -> Result<()> {
        validate_user_record(&record)?;
        self.mutate(|users| {
            let existing = users
                .iter_mut()
                .find(|u| u.user_id == record.user_id)
                .ok_or_else(|| SecurityError::UserNotFound(record.user_id.clone()))?;
            // The stored password survives any update; changes go through
            // set_password only.
            let encrypted_password = existing.encrypted_password.take();
            *existing = UserRecord {
                encrypted_password,
                ..record
            };
            Ok(())
        })
    }

    fn delete_user(&self, user_id: &str) -> Result<()> {
        self.mutate(|users| {
            let before = users.len();
            users.retain(|u| u.user_id != user_id);
            if users.len() == before {
                return Err(SecurityError::UserNotFound(user_id.to_string()));
            }
            Ok(())
        })
    }

    fn set_password(&self, user_id: &str, secret: &str) -> Result<()> {
        let digest = self.digester.digest(secret);
        self.mutate(|users| {
            let existing = users
                .iter_mut()
                .find(|u| u.user_id == user_id)
                .ok_or_else(|| SecurityError::UserNotFound(user_id.to_string()))?;
            existing.encrypted_password = Some(digest);
            Ok(())
        })
    }

    fn is_valid_user(&self, user_id: &str, secret: &str) -> Result<bool> {
        let submitted = self.digester.digest(secret);
        let mut registry = self.registry.lock();
        self.refresh(&mut registry)?;

        let valid = registry
            .users
            .iter()
            .find(|u| u.user_id == user_id)
            .and_then(|u| u.encrypted_password.as_deref())
            .map(|stored| stored == submitted)
            .unwrap_or(false);

        if valid {
            self.metrics.record_authentication_success();
        } else {
            self.metrics.record_authentication_failure();
        }
        Ok(valid)
    }
}
