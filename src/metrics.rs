//! Security Metrics Collection
//!
//! Lightweight counters for the security core: authentication outcomes,
//! credential-cache behavior, directory failover/retry activity, and
//! authorization resolution latency. Counters are atomic so they can be
//! shared freely across threads without locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Metrics collector shared by the providers, the resolver, and the facade.
#[derive(Debug, Default)]
pub struct SecurityMetrics {
    // Authentication metrics
    auth_success_count: AtomicU64,
    auth_failure_count: AtomicU64,

    // Credential cache metrics
    credential_cache_hits: AtomicU64,
    credential_cache_misses: AtomicU64,

    // Directory metrics
    directory_binds: AtomicU64,
    directory_searches: AtomicU64,
    directory_failovers: AtomicU64,
    directory_retries: AtomicU64,

    // Authorization metrics
    authz_check_count: AtomicU64,
    authz_denied_count: AtomicU64,
    authz_latency_sum_nanos: AtomicU64,
    authz_latency_count: AtomicU64,

    // Namespace record cache metrics
    record_cache_hits: AtomicU64,
    record_cache_misses: AtomicU64,
}

impl SecurityMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_authentication_success(&self) {
        self.auth_success_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_authentication_failure(&self) {
        self.auth_failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_credential_cache_hit(&self) {
        self.credential_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_credential_cache_miss(&self) {
        self.credential_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_directory_bind(&self) {
        self.directory_binds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_directory_search(&self) {
        self.directory_searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_directory_failover(&self) {
        self.directory_failovers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_directory_retry(&self) {
        self.directory_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_authorization_check(&self, allowed: bool, latency: Duration) {
        self.authz_check_count.fetch_add(1, Ordering::Relaxed);
        if !allowed {
            self.authz_denied_count.fetch_add(1, Ordering::Relaxed);
        }
        self.authz_latency_sum_nanos
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        self.authz_latency_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_record_cache_hit(&self) {
        self.record_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_record_cache_miss(&self) {
        self.record_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time snapshot for health endpoints and tests.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency_count = self.authz_latency_count.load(Ordering::Relaxed);
        let latency_sum = self.authz_latency_sum_nanos.load(Ordering::Relaxed);
        MetricsSnapshot {
            auth_success_count: self.auth_success_count.load(Ordering::Relaxed),
            auth_failure_count: self.auth_failure_count.load(Ordering::Relaxed),
            credential_cache_hits: self.credential_cache_hits.load(Ordering::Relaxed),
            credential_cache_misses: self.credential_cache_misses.load(Ordering::Relaxed),
            directory_binds: self.directory_binds.load(Ordering::Relaxed),
            directory_searches: self.directory_searches.load(Ordering::Relaxed),
            directory_failovers: self.directory_failovers.load(Ordering::Relaxed),
            directory_retries: self.directory_retries.load(Ordering::Relaxed),
            authz_check_count: self.authz_check_count.load(Ordering::Relaxed),
            authz_denied_count: self.authz_denied_count.load(Ordering::Relaxed),
            avg_authz_latency_nanos: if latency_count > 0 {
                latency_sum / latency_count
            } else {
                0
            },
            record_cache_hits: self.record_cache_hits.load(Ordering::Relaxed),
            record_cache_misses: self.record_cache_misses.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of all security counters.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub auth_success_count: u64,
    pub auth_failure_count: u64,
    pub credential_cache_hits: u64,
    pub credential_cache_misses: u64,
    pub directory_binds: u64,
    pub directory_searches: u64,
    pub directory_failovers: u64,
    pub directory_retries: u64,
    pub authz_check_count: u64,
    pub authz_denied_count: u64,
    pub avg_authz_latency_nanos: u64,
    pub record_cache_hits: u64,
    pub record_cache_misses: u64,
}
