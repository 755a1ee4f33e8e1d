//! Authentication Caches
//!
//! Two independent caches back the directory provider:
//!
//! - `CredentialCache` remembers the outcome of the last live credential
//!   check per user, keyed by a digest of the submitted secret. An entry is
//!   trusted only when the digest of the *currently* submitted secret
//!   matches the stored one; any mismatch forces a live check.
//! - `ProfileCache` gates how often display attributes are re-fetched,
//!   independently of credential verification.
//!
//! Entries expire by TTL and are swept lazily on access; there is no
//! background timer.

use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

const DEFAULT_CREDENTIAL_CACHE_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
struct CredentialCacheEntry {
    secret_digest: String,
    success: bool,
    expires_at: Instant,
}

impl CredentialCacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// TTL-bound cache of (user id -> last credential check result).
pub struct CredentialCache {
    entries: Mutex<LruCache<String, CredentialCacheEntry>>,
    ttl: Duration,
}

impl CredentialCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_CREDENTIAL_CACHE_CAPACITY)
    }

    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Return the cached outcome for `user_id`, but only when the digest of
    /// the currently submitted secret matches the cached digest and the
    /// entry has not expired. Expired entries are evicted on the way.
    pub fn lookup(&self, user_id: &str, secret_digest: &str) -> Option<bool> {
        let mut entries = self.entries.lock();
        match entries.get(user_id) {
            Some(entry) if entry.is_expired() => {
                entries.pop(user_id);
                None
            }
            Some(entry) if entry.secret_digest == secret_digest => Some(entry.success),
            _ => None,
        }
    }

    /// Record the outcome of a live check. Both success and failure are
    /// cached; a different secret on the next call bypasses either.
    pub fn store(&self, user_id: &str, secret_digest: String, success: bool) {
        let entry = CredentialCacheEntry {
            secret_digest,
            success,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.lock().put(user_id.to_string(), entry);
    }

    pub fn invalidate(&self, user_id: &str) {
        self.entries.lock().pop(user_id);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-user refresh gate for directory profile attributes.
pub struct ProfileCache {
    refresh_after: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

impl ProfileCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            refresh_after: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Whether profile attributes for `user_id` are due for a re-fetch.
    pub fn needs_refresh(&self, user_id: &str) -> bool {
        let refresh_after = self.refresh_after.lock();
        match refresh_after.get(user_id) {
            Some(deadline) => Instant::now() >= *deadline,
            None => true,
        }
    }

    pub fn mark_refreshed(&self, user_id: &str) {
        self.refresh_after
            .lock()
            .insert(user_id.to_string(), Instant::now() + self.ttl);
    }

    pub fn invalidate(&self, user_id: &str) {
        self.refresh_after.lock().remove(user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_requires_matching_digest() {
        let cache = CredentialCache::new(Duration::from_secs(60));
        cache.store("alice", "digest-a".to_string(), true);

        assert_eq!(cache.lookup("alice", "digest-a"), Some(true));
        // A different secret digest must force a live check.
        assert_eq!(cache.lookup("alice", "digest-b"), None);
    }

    #[test]
    fn test_failure_outcomes_are_cached_too() {
        let cache = CredentialCache::new(Duration::from_secs(60));
        cache.store("alice", "digest-a".to_string(), false);
        assert_eq!(cache.lookup("alice", "digest-a"), Some(false));
    }

    #[test]
    fn test_expired_entries_are_swept_on_access() {
        let cache = CredentialCache::new(Duration::from_millis(0));
        cache.store("alice", "digest-a".to_string(), true);
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(cache.lookup("alice", "digest-a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_bound_evicts_oldest() {
        let cache = CredentialCache::with_capacity(Duration::from_secs(60), 2);
        cache.store("a", "d".to_string(), true);
        cache.store("b", "d".to_string(), true);
        cache.store("c", "d".to_string(), true);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup("a", "d"), None);
    }

    #[test]
    fn test_profile_cache_gates_refresh() {
        let cache = ProfileCache::new(Duration::from_secs(60));
        assert!(cache.needs_refresh("alice"));

        cache.mark_refreshed("alice");
        assert!(!cache.needs_refresh("alice"));

        cache.invalidate("alice");
        assert!(cache.needs_refresh("alice"));
    }

    #[test]
    fn test_profile_cache_expiry() {
        let cache = ProfileCache::new(Duration::from_millis(0));
        cache.mark_refreshed("alice");
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.needs_refresh("alice"));
    }
}
