pub mod auth;
pub mod authz;
pub mod changeset;
pub mod config;
pub mod error;
pub mod groups;
pub mod manager;
pub mod metrics;
pub mod types;

#[cfg(test)]
mod tests;

pub use auth::{AuthenticationProvider, DirectoryAuthenticationProvider, LocalAccountStore};
pub use authz::{AuthorizationProvider, NamespaceAuthorizationResolver, NamespacePermissionRecord};
pub use config::SecurityConfig;
pub use error::{Result, SecurityError};
pub use groups::{GroupSource, StaticGroupSource};
pub use manager::SecurityManager;
pub use metrics::{MetricsSnapshot, SecurityMetrics};
pub use types::{
    Artifact, ArtifactStatus, PermissionLevel, Principal, UserGroup, UserRecord,
    ADMINISTRATORS_GROUP, ANONYMOUS_USER_ID,
};
