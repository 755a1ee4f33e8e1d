//! Shared fixtures: an in-memory scriptable directory server and config
//! builders for both directory modes.

use crate::auth::{BindOutcome, DirectoryConnection, DirectoryConnector, DirectoryEntry};
use crate::config::DirectoryConfig;
use crate::error::{Result, SecurityError};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const SERVICE_DN: &str = "cn=service,dc=example,dc=org";
pub const SERVICE_PASSWORD: &str = "svc-pw";
pub const PEOPLE_BASE: &str = "ou=people,dc=example,dc=org";
pub const PRIMARY_URL: &str = "ldap://primary:389";
pub const ALTERNATE_URL: &str = "ldap://backup:389";

#[derive(Default)]
struct ServerState {
    entries: Vec<DirectoryEntry>,
    passwords: HashMap<String, String>,
    bind_counts: HashMap<String, usize>,
    search_count: usize,
    connect_counts: HashMap<String, usize>,
    refused_connects: HashMap<String, usize>,
    failing_operations: usize,
    unauthenticated_bind_succeeds: bool,
}

/// In-memory directory server shared by a connector and the test body.
///
/// Failures are scripted: connections to a URL can be refused a set
/// number of times and the next N protocol operations can be made to
/// fail transiently.
#[derive(Default)]
pub struct MockDirectoryServer {
    state: Mutex<ServerState>,
}

impl MockDirectoryServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_entry(&self, dn: &str, attributes: &[(&str, &str)]) {
        let mut attrs: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in attributes {
            attrs
                .entry((*name).to_string())
                .or_default()
                .push((*value).to_string());
        }
        self.state.lock().entries.push(DirectoryEntry {
            dn: dn.to_string(),
            attributes: attrs,
        });
    }

    pub fn set_password(&self, dn: &str, password: &str) {
        self.state
            .lock()
            .passwords
            .insert(dn.to_string(), password.to_string());
    }

    /// Refuse the next `count` connection attempts to `url`.
    pub fn refuse_connections(&self, url: &str, count: usize) {
        self.state
            .lock()
            .refused_connects
            .insert(url.to_string(), count);
    }

    /// Fail the next `count` binds/searches with a transient error.
    pub fn fail_next_operations(&self, count: usize) {
        self.state.lock().failing_operations = count;
    }

    /// Answer success to non-empty-DN binds with an empty password, the
    /// RFC 4513 unauthenticated-bind behavior some servers exhibit.
    pub fn accept_unauthenticated_binds(&self) {
        self.state.lock().unauthenticated_bind_succeeds = true;
    }

    pub fn bind_count(&self, dn: &str) -> usize {
        self.state.lock().bind_counts.get(dn).copied().unwrap_or(0)
    }

    pub fn search_count(&self) -> usize {
        self.state.lock().search_count
    }

    pub fn connect_count(&self, url: &str) -> usize {
        self.state
            .lock()
            .connect_counts
            .get(url)
            .copied()
            .unwrap_or(0)
    }
}

pub struct MockDirectoryConnector {
    server: Arc<MockDirectoryServer>,
}

impl MockDirectoryConnector {
    pub fn new(server: Arc<MockDirectoryServer>) -> Arc<Self> {
        Arc::new(Self { server })
    }
}

impl DirectoryConnector for MockDirectoryConnector {
    fn connect(&self, url: &str, _config: &DirectoryConfig) -> Result<Box<dyn DirectoryConnection>> {
        let mut state = self.server.state.lock();
        *state.connect_counts.entry(url.to_string()).or_default() += 1;
        if let Some(remaining) = state.refused_connects.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SecurityError::DirectoryUnavailable(format!(
                    "connection refused: {url}"
                )));
            }
        }
        drop(state);
        Ok(Box::new(MockConnection {
            server: self.server.clone(),
        }))
    }
}

struct MockConnection {
    server: Arc<MockDirectoryServer>,
}

impl MockConnection {
    fn check_scripted_failure(state: &mut ServerState) -> Result<()> {
        if state.failing_operations > 0 {
            state.failing_operations -= 1;
            return Err(SecurityError::DirectoryUnavailable(
                "scripted transient failure".to_string(),
            ));
        }
        Ok(())
    }
}

impl DirectoryConnection for MockConnection {
    fn simple_bind(&mut self, dn: &str, password: &str) -> Result<BindOutcome> {
        let mut state = self.server.state.lock();
        Self::check_scripted_failure(&mut state)?;
        *state.bind_counts.entry(dn.to_string()).or_default() += 1;
        if dn.is_empty() {
            return Ok(BindOutcome::Success);
        }
        if password.is_empty() && state.unauthenticated_bind_succeeds {
            return Ok(BindOutcome::Success);
        }
        Ok(match state.passwords.get(dn) {
            Some(stored) if stored == password => BindOutcome::Success,
            _ => BindOutcome::InvalidCredentials,
        })
    }

    fn search(
        &mut self,
        base: &str,
        _subtree: bool,
        filter: &str,
        _attributes: &[&str],
        _timeout: Duration,
    ) -> Result<Vec<DirectoryEntry>> {
        let mut state = self.server.state.lock();
        Self::check_scripted_failure(&mut state)?;
        state.search_count += 1;

        // Supports the single-equality filters the provider produces,
        // e.g. `(uid=alice)` or `(uid=*)`.
        let (attribute, value) = filter
            .trim_start_matches('(')
            .trim_end_matches(')')
            .split_once('=')
            .unwrap_or(("", ""));

        Ok(state
            .entries
            .iter()
            .filter(|entry| base.is_empty() || entry.dn.ends_with(base))
            .filter(|entry| match entry.attributes.get(attribute) {
                Some(values) => value == "*" || values.iter().any(|v| v == value),
                None => false,
            })
            .cloned()
            .collect())
    }

    fn read_entry(&mut self, dn: &str, _attributes: &[&str]) -> Result<Option<DirectoryEntry>> {
        let mut state = self.server.state.lock();
        Self::check_scripted_failure(&mut state)?;
        state.search_count += 1;
        Ok(state.entries.iter().find(|entry| entry.dn == dn).cloned())
    }

    fn close(&mut self) {}
}

/// Search-mode config pointed at the mock server's people subtree.
pub fn search_mode_config() -> DirectoryConfig {
    DirectoryConfig {
        connection_url: PRIMARY_URL.to_string(),
        connection_principal: Some(SERVICE_DN.to_string()),
        connection_password: Some(SERVICE_PASSWORD.to_string()),
        user_search_base: Some(PEOPLE_BASE.to_string()),
        user_search_patterns: vec!["(uid={0})".to_string()],
        ..Default::default()
    }
}

/// Lookup-mode config using the standard uid DN template.
pub fn lookup_mode_config() -> DirectoryConfig {
    DirectoryConfig {
        connection_url: PRIMARY_URL.to_string(),
        user_pattern: Some(format!("uid={{0}},{PEOPLE_BASE}")),
        ..Default::default()
    }
}

pub fn person_dn(user_id: &str) -> String {
    format!("uid={user_id},{PEOPLE_BASE}")
}
