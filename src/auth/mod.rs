//! Authentication Providers
//!
//! This module defines the `AuthenticationProvider` seam and its two
//! implementations: the file-backed `LocalAccountStore` (the default) and
//! the remote `DirectoryAuthenticationProvider`. Shared record validation
//! and candidate matching live here so both providers apply identical
//! rules without any inheritance tricks.

pub mod cache;
pub mod digest;
pub mod directory;
pub mod ldap;
pub mod local;
pub mod store;

pub use cache::{CredentialCache, ProfileCache};
pub use digest::SecretDigester;
pub use directory::{
    BindOutcome, DirectoryAuthenticationProvider, DirectoryConnection, DirectoryConnector,
    DirectoryEntry,
};
pub use ldap::LdapConnector;
pub use local::LocalAccountStore;
pub use store::{FileUserStore, UserStore};

use crate::error::{Result, SecurityError};
use crate::types::UserRecord;

/// Credential verification and user management behind one interface.
///
/// `is_valid_user` never fails for ordinary invalid credentials; it
/// returns `Ok(false)`. Only infrastructure problems (unreachable
/// directory, broken persistence, bad configuration) are errors.
pub trait AuthenticationProvider: Send + Sync {
    fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>>;

    /// All known users, sorted by (last name, first name, email, user id).
    fn get_all_users(&self) -> Result<Vec<UserRecord>>;

    /// Users matching a free-text criteria string, capped at `max_results`.
    fn search_candidate_users(&self, criteria: &str, max_results: usize)
        -> Result<Vec<UserRecord>>;

    fn add_user(&self, record: UserRecord) -> Result<()>;

    /// Update everything except `encrypted_password`, which is preserved
    /// unconditionally; password changes go through `set_password`.
    fn update_user(&self, record: UserRecord) -> Result<()>;

    fn delete_user(&self, user_id: &str) -> Result<()>;

    fn set_password(&self, user_id: &str, secret: &str) -> Result<()>;

    fn is_valid_user(&self, user_id: &str, secret: &str) -> Result<bool>;
}

/// Structural validation applied by every provider before a mutation.
pub(crate) fn validate_user_record(record: &UserRecord) -> Result<()> {
    if record.user_id.is_empty() {
        return Err(SecurityError::InvalidUser(
            "user_id must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Case-insensitive substring match over the identity and display fields.
pub(crate) fn matches_criteria(record: &UserRecord, criteria: &str) -> bool {
    if criteria.is_empty() {
        return true;
    }
    let needle = criteria.to_lowercase();
    let haystacks = [
        Some(record.user_id.as_str()),
        record.first_name.as_deref(),
        record.last_name.as_deref(),
        record.email.as_deref(),
    ];
    haystacks
        .iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
}
