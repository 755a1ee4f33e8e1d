//! Directory Authentication Provider
//!
//! Authenticates against a remote LDAP-style directory in one of two
//! mutually exclusive modes, selected at construction:
//!
//! - **User-lookup mode** (`user_pattern` configured): the pattern maps a
//!   user id straight to a distinguished name; the provider binds with the
//!   fixed service account, reads the password attribute at that DN and
//!   compares a locally computed digest of the submitted secret.
//! - **User-search mode**: filter templates are applied in order against
//!   the search base; the first template yielding exactly one match
//!   determines the DN, and validity is proven by binding as that DN with
//!   the submitted secret. Multiple matches for one template count as no
//!   match.
//!
//! Every operation tries the primary URL first and falls over to the
//! alternate on a transient connect failure; one end-to-end retry is
//! allowed for transient failures. Connections opened for a logical
//! operation are closed on all exit paths.

use super::{matches_criteria, AuthenticationProvider, CredentialCache, ProfileCache, SecretDigester};
use crate::config::DirectoryConfig;
use crate::error::{Result, SecurityError};
use crate::metrics::SecurityMetrics;
use crate::types::UserRecord;

use ldap3::ldap_escape;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Placeholder substituted with the user id in DN and filter templates.
const TEMPLATE_PLACEHOLDER: &str = "{0}";

/// A directory entry: its distinguished name and requested attributes.
#[derive(Debug, Clone, Default)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// First value of an attribute, if present.
    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .get(attribute)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Result of a bind attempt. Rejected credentials are a value, not an
/// error; only infrastructure failures surface as `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Success,
    InvalidCredentials,
}

/// One live connection to a directory server.
pub trait DirectoryConnection: Send {
    fn simple_bind(&mut self, dn: &str, password: &str) -> Result<BindOutcome>;

    /// Search under `base` with the given filter; `subtree` selects the
    /// scope. Only the named attributes are fetched.
    fn search(
        &mut self,
        base: &str,
        subtree: bool,
        filter: &str,
        attributes: &[&str],
        timeout: Duration,
    ) -> Result<Vec<DirectoryEntry>>;

    /// Read one entry by DN (base-scope lookup).
    fn read_entry(&mut self, dn: &str, attributes: &[&str]) -> Result<Option<DirectoryEntry>>;

    /// Best-effort close; failures are ignored by callers.
    fn close(&mut self);
}

/// Produces connections to a directory URL.
pub trait DirectoryConnector: Send + Sync {
    fn connect(&self, url: &str, config: &DirectoryConfig) -> Result<Box<dyn DirectoryConnection>>;
}

/// Remote-directory `AuthenticationProvider`.
///
/// User records fetched from the directory are ephemeral views; only the
/// in-process profile registry and its refresh timestamps are kept.
pub struct DirectoryAuthenticationProvider {
    config: DirectoryConfig,
    connector: Arc<dyn DirectoryConnector>,
    digester: SecretDigester,
    credential_cache: CredentialCache,
    profile_cache: ProfileCache,
    profiles: RwLock<HashMap<String, UserRecord>>,
    metrics: Arc<SecurityMetrics>,
}

impl DirectoryAuthenticationProvider {
    pub fn new(
        config: DirectoryConfig,
        connector: Arc<dyn DirectoryConnector>,
        metrics: Arc<SecurityMetrics>,
    ) -> Result<Self> {
        config.validate()?;
        let digester = SecretDigester::new(config.digest_algorithm, config.digest_encoding);
        let credential_cache =
            CredentialCache::new(Duration::from_millis(config.authentication_cache_timeout_ms));
        let profile_cache =
            ProfileCache::new(Duration::from_millis(config.profile_cache_timeout_ms));
        Ok(Self {
            config,
            connector,
            digester,
            credential_cache,
            profile_cache,
            profiles: RwLock::new(HashMap::new()),
            metrics,
        })
    }

    pub fn credential_cache(&self) -> &CredentialCache {
        &self.credential_cache
    }

    /// Open a connection, falling back to the alternate URL when the
    /// primary fails with a transient error.
    fn open_connection(&self) -> Result<Box<dyn DirectoryConnection>> {
        match self.connector.connect(&self.config.connection_url, &self.config) {
            Ok(connection) => Ok(connection),
            Err(e) if e.is_transient() => match &self.config.alternate_url {
                Some(alternate) => {
                    warn!(
                        primary = %self.config.connection_url,
                        alternate = %alternate,
                        error = %e,
                        "primary directory unreachable, trying alternate"
                    );
                    self.metrics.record_directory_failover();
                    self.connector.connect(alternate, &self.config)
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// Run one logical operation against the directory. Transient failures
    /// get exactly one full extra attempt; the connection obtained for
    /// each attempt is closed on every exit path.
    fn with_connection<T, F>(&self, op: F) -> Result<T>
    where
        F: Fn(&mut dyn DirectoryConnection) -> Result<T>,
    {
        let mut retried = false;
        loop {
            let result = (|| {
                let mut connection = self.open_connection()?;
                let outcome = op(connection.as_mut());
                connection.close();
                outcome
            })();
            match result {
                Err(e) if e.is_transient() && !retried => {
                    warn!(error = %e, "transient directory failure, retrying once");
                    self.metrics.record_directory_retry();
                    retried = true;
                }
                other => return other,
            }
        }
    }

    /// Bind with the configured service account (or anonymously when no
    /// principal is configured). A rejected service bind is a
    /// configuration-level failure, not an invalid-credential result.
    fn service_bind(&self, connection: &mut dyn DirectoryConnection) -> Result<()> {
        let principal = self.config.connection_principal.as_deref().unwrap_or("");
        let password = self.config.connection_password.as_deref().unwrap_or("");
        self.metrics.record_directory_bind();
        match connection.simple_bind(principal, password)? {
            BindOutcome::Success => Ok(()),
            BindOutcome::InvalidCredentials => Err(SecurityError::Directory(
                "directory rejected the service account bind".to_string(),
            )),
        }
    }

    fn lookup_dn(&self, user_id: &str) -> String {
        // DN templates take the raw id; filter templates take the escaped one.
        self.config
            .user_pattern
            .as_deref()
            .unwrap_or_default()
            .replace(TEMPLATE_PLACEHOLDER, user_id)
    }

    /// Apply the search patterns in order; the first pattern with exactly
    /// one match wins. Multiple matches are logged and treated as no match.
    fn find_user_entry(
        &self,
        connection: &mut dyn DirectoryConnection,
        user_id: &str,
        attributes: &[&str],
    ) -> Result<Option<DirectoryEntry>> {
        let base = self.config.user_search_base.as_deref().unwrap_or_default();
        let escaped = ldap_escape(user_id);
        let timeout = Duration::from_millis(self.config.user_search_timeout_ms);

        for pattern in &self.config.user_search_patterns {
            let filter = pattern.replace(TEMPLATE_PLACEHOLDER, &escaped);
            self.metrics.record_directory_search();
            let mut entries = connection.search(
                base,
                self.config.search_user_subtree,
                &filter,
                attributes,
                timeout,
            )?;
            match entries.len() {
                0 => continue,
                1 => return Ok(Some(entries.remove(0))),
                n => {
                    warn!(
                        user_id = %user_id,
                        filter = %filter,
                        matches = n,
                        "search pattern matched multiple entries, treating as no match"
                    );
                    continue;
                }
            }
        }
        Ok(None)
    }

    /// Lookup-mode credential check: compare a locally computed digest
    /// against the stored password attribute.
    fn check_by_lookup(&self, user_id: &str, submitted_digest: &str) -> Result<bool> {
        let dn = self.lookup_dn(user_id);
        let password_attribute = self.config.user_password_attribute.clone();
        let stored = self.with_connection(|connection| {
            self.service_bind(connection)?;
            self.metrics.record_directory_search();
            let entry = connection.read_entry(&dn, &[password_attribute.as_str()])?;
            Ok(entry.and_then(|e| e.first(&password_attribute).map(str::to_string)))
        })?;
        Ok(stored.map(|s| s == submitted_digest).unwrap_or(false))
    }

    /// Search-mode credential check: resolve the DN, then prove validity
    /// by binding as that DN with the submitted secret.
    fn check_by_search(&self, user_id: &str, secret: &str) -> Result<bool> {
        let dn = self.with_connection(|connection| {
            self.service_bind(connection)?;
            Ok(self
                .find_user_entry(connection, user_id, &[])?
                .map(|entry| entry.dn))
        })?;

        let Some(dn) = dn else {
            debug!(user_id = %user_id, "no directory entry matched any search pattern");
            return Ok(false);
        };

        self.with_connection(|connection| {
            self.metrics.record_directory_bind();
            Ok(matches!(
                connection.simple_bind(&dn, secret)?,
                BindOutcome::Success
            ))
        })
    }

    fn profile_attributes(&self) -> [&str; 5] {
        [
            self.config.user_id_attribute.as_str(),
            self.config.user_last_name_attribute.as_str(),
            self.config.user_first_name_attribute.as_str(),
            self.config.user_full_name_attribute.as_str(),
            self.config.user_email_attribute.as_str(),
        ]
    }

    fn record_from_entry(&self, user_id: &str, entry: &DirectoryEntry) -> UserRecord {
        let mut record = UserRecord::new(
            entry
                .first(&self.config.user_id_attribute)
                .unwrap_or(user_id),
        );
        record.last_name = entry
            .first(&self.config.user_last_name_attribute)
            .map(str::to_string);
        record.first_name = entry
            .first(&self.config.user_first_name_attribute)
            .map(str::to_string);
        record.email = entry
            .first(&self.config.user_email_attribute)
            .map(str::to_string);

        // Fall back to splitting the full name when the granular
        // attributes are not populated.
        if record.first_name.is_none() && record.last_name.is_none() {
            if let Some(full_name) = entry.first(&self.config.user_full_name_attribute) {
                match full_name.split_once(' ') {
                    Some((first, last)) => {
                        record.first_name = Some(first.to_string());
                        record.last_name = Some(last.to_string());
                    }
                    None => record.last_name = Some(full_name.to_string()),
                }
            }
        }
        record
    }

    /// Fetch profile attributes for one user from the directory.
    fn fetch_profile(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let attributes = self.profile_attributes();
        let entry = if self.config.is_lookup_mode() {
            let dn = self.lookup_dn(user_id);
            self.with_connection(|connection| {
                self.service_bind(connection)?;
                self.metrics.record_directory_search();
                connection.read_entry(&dn, &attributes)
            })?
        } else {
            self.with_connection(|connection| {
                self.service_bind(connection)?;
                self.find_user_entry(connection, user_id, &attributes)
            })?
        };
        Ok(entry.map(|e| self.record_from_entry(user_id, &e)))
    }

    fn unsupported(operation: &str) -> SecurityError {
        SecurityError::UnsupportedOperation(format!(
            "{operation} is not supported for directory-backed accounts"
        ))
    }
}

impl AuthenticationProvider for DirectoryAuthenticationProvider {
    fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        if !self.profile_cache.needs_refresh(user_id) {
            return Ok(self.profiles.read().get(user_id).cloned());
        }

        let fetched = self.fetch_profile(user_id)?;
        let mut profiles = self.profiles.write();
        match &fetched {
            Some(record) => {
                profiles.insert(user_id.to_string(), record.clone());
            }
            None => {
                profiles.remove(user_id);
            }
        }
        drop(profiles);
        self.profile_cache.mark_refreshed(user_id);
        Ok(fetched)
    }

    fn get_all_users(&self) -> Result<Vec<UserRecord>> {
        let mut users: Vec<UserRecord> = if self.config.is_lookup_mode() {
            // Lookup mode cannot enumerate the directory; expose the
            // profiles seen so far.
            self.profiles.read().values().cloned().collect()
        } else {
            let attributes = self.profile_attributes();
            let base = self.config.user_search_base.as_deref().unwrap_or_default();
            let timeout = Duration::from_millis(self.config.user_search_timeout_ms);
            let entries = self.with_connection(|connection| {
                self.service_bind(connection)?;
                let pattern = &self.config.user_search_patterns[0];
                let filter = pattern.replace(TEMPLATE_PLACEHOLDER, "*");
                self.metrics.record_directory_search();
                connection.search(
                    base,
                    self.config.search_user_subtree,
                    &filter,
                    &attributes,
                    timeout,
                )
            })?;
            entries
                .iter()
                .map(|entry| self.record_from_entry("", entry))
                .filter(|record| !record.user_id.is_empty())
                .collect()
        };
        users.sort();
        Ok(users)
    }

    fn search_candidate_users(
        &self,
        criteria: &str,
        max_results: usize,
    ) -> Result<Vec<UserRecord>> {
        let mut users: Vec<UserRecord> = self
            .get_all_users()?
            .into_iter()
            .filter(|record| matches_criteria(record, criteria))
            .take(max_results)
            .collect();
        users.sort();
        Ok(users)
    }

    fn add_user(&self, _record: UserRecord) -> Result<()> {
        Err(Self::unsupported("add_user"))
    }

    fn update_user(&self, _record: UserRecord) -> Result<()> {
        Err(Self::unsupported("update_user"))
    }

    fn delete_user(&self, _user_id: &str) -> Result<()> {
        Err(Self::unsupported("delete_user"))
    }

    fn set_password(&self, _user_id: &str, _secret: &str) -> Result<()> {
        Err(Self::unsupported("set_password"))
    }

    fn is_valid_user(&self, user_id: &str, secret: &str) -> Result<bool> {
        // An empty secret must never reach a bind: RFC 4513 treats a
        // non-empty-DN bind with an empty password as an unauthenticated
        // bind, which servers may answer with success.
        if secret.is_empty() {
            self.metrics.record_authentication_failure();
            return Ok(false);
        }

        let submitted_digest = self.digester.digest(secret);

        if let Some(outcome) = self.credential_cache.lookup(user_id, &submitted_digest) {
            self.metrics.record_credential_cache_hit();
            if outcome {
                self.metrics.record_authentication_success();
            } else {
                self.metrics.record_authentication_failure();
            }
            return Ok(outcome);
        }
        self.metrics.record_credential_cache_miss();

        let valid = if self.config.is_lookup_mode() {
            self.check_by_lookup(user_id, &submitted_digest)?
        } else {
            self.check_by_search(user_id, secret)?
        };

        self.credential_cache
            .store(user_id, submitted_digest, valid);
        if valid {
            self.metrics.record_authentication_success();
        } else {
            self.metrics.record_authentication_failure();
        }
        Ok(valid)
    }
}
