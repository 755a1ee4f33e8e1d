//! LDAP Transport
//!
//! Production `DirectoryConnector` over ldap3's synchronous client. All
//! protocol-level failures are classified here: communication problems
//! (connect failures, timeouts, server busy/unavailable result codes)
//! become the transient `DirectoryUnavailable`, everything else the
//! non-transient `Directory` error. Invalid credentials on bind are a
//! `BindOutcome`, never an error.

use super::directory::{BindOutcome, DirectoryConnection, DirectoryConnector, DirectoryEntry};
use crate::config::DirectoryConfig;
use crate::error::{Result, SecurityError};

use ldap3::{LdapConn, LdapConnSettings, LdapError, Scope, SearchEntry, SearchOptions};
use std::time::Duration;
use tracing::debug;

// LDAP result codes this crate cares about.
const RC_SUCCESS: u32 = 0;
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_BUSY: u32 = 51;
const RC_UNAVAILABLE: u32 = 52;

/// Connects to LDAP servers with the configured connection timeout and
/// optional StartTLS upgrade.
#[derive(Debug, Default)]
pub struct LdapConnector;

impl LdapConnector {
    pub fn new() -> Self {
        Self
    }
}

impl DirectoryConnector for LdapConnector {
    fn connect(&self, url: &str, config: &DirectoryConfig) -> Result<Box<dyn DirectoryConnection>> {
        let mut settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_millis(config.connection_timeout_ms));
        if matches!(
            config.connection_protocol.as_deref(),
            Some("tls") | Some("starttls")
        ) {
            settings = settings.set_starttls(true);
        }

        let conn = LdapConn::with_settings(settings, url).map_err(|e| {
            SecurityError::DirectoryUnavailable(format!("failed to connect to {url}: {e}"))
        })?;
        debug!(url = %url, "directory connection established");
        Ok(Box::new(LdapDirectoryConnection { conn }))
    }
}

struct LdapDirectoryConnection {
    conn: LdapConn,
}

impl LdapDirectoryConnection {
    fn map_error(e: LdapError) -> SecurityError {
        match e {
            LdapError::Io { source } => {
                SecurityError::DirectoryUnavailable(format!("directory I/O failure: {source}"))
            }
            LdapError::Timeout { .. } => {
                SecurityError::DirectoryUnavailable("directory operation timed out".to_string())
            }
            LdapError::EndOfStream { .. } => {
                SecurityError::DirectoryUnavailable("directory connection closed".to_string())
            }
            other => SecurityError::Directory(other.to_string()),
        }
    }

    fn classify_result_code(rc: u32, context: &str) -> SecurityError {
        if rc == RC_BUSY || rc == RC_UNAVAILABLE {
            SecurityError::DirectoryUnavailable(format!("{context}: server result code {rc}"))
        } else {
            SecurityError::Directory(format!("{context}: server result code {rc}"))
        }
    }
}

impl DirectoryConnection for LdapDirectoryConnection {
    fn simple_bind(&mut self, dn: &str, password: &str) -> Result<BindOutcome> {
        // RFC 4513 §5.1.2: a non-empty DN with an empty password is an
        // unauthenticated bind and may succeed on the server side.
        if !dn.is_empty() && password.is_empty() {
            return Ok(BindOutcome::InvalidCredentials);
        }
        let result = self
            .conn
            .simple_bind(dn, password)
            .map_err(Self::map_error)?;
        match result.rc {
            RC_SUCCESS => Ok(BindOutcome::Success),
            RC_INVALID_CREDENTIALS => Ok(BindOutcome::InvalidCredentials),
            rc => Err(Self::classify_result_code(rc, "bind failed")),
        }
    }

    fn search(
        &mut self,
        base: &str,
        subtree: bool,
        filter: &str,
        attributes: &[&str],
        timeout: Duration,
    ) -> Result<Vec<DirectoryEntry>> {
        let scope = if subtree {
            Scope::Subtree
        } else {
            Scope::OneLevel
        };
        let timelimit = timeout.as_secs().max(1) as i32;
        let result = self
            .conn
            .with_search_options(SearchOptions::new().timelimit(timelimit))
            .search(base, scope, filter, attributes.to_vec())
            .map_err(Self::map_error)?;

        let ldap_result = &result.1;
        if ldap_result.rc != RC_SUCCESS && ldap_result.rc != RC_NO_SUCH_OBJECT {
            return Err(Self::classify_result_code(ldap_result.rc, "search failed"));
        }

        Ok(result
            .0
            .into_iter()
            .map(|raw| {
                let entry = SearchEntry::construct(raw);
                DirectoryEntry {
                    dn: entry.dn,
                    attributes: entry.attrs,
                }
            })
            .collect())
    }

    fn read_entry(&mut self, dn: &str, attributes: &[&str]) -> Result<Option<DirectoryEntry>> {
        let result = self
            .conn
            .search(dn, Scope::Base, "(objectClass=*)", attributes.to_vec())
            .map_err(Self::map_error)?;

        let ldap_result = &result.1;
        if ldap_result.rc == RC_NO_SUCH_OBJECT {
            return Ok(None);
        }
        if ldap_result.rc != RC_SUCCESS {
            return Err(Self::classify_result_code(ldap_result.rc, "lookup failed"));
        }

        Ok(result.0.into_iter().next().map(|raw| {
            let entry = SearchEntry::construct(raw);
            DirectoryEntry {
                dn: entry.dn,
                attributes: entry.attrs,
            }
        }))
    }

    fn close(&mut self) {
        // Unbind failures are irrelevant once the operation is finished.
        let _ = self.conn.unbind();
    }
}
