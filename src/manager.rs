//! Security Manager
//!
//! The single entry point an embedding repository server talks to. The
//! manager composes an authentication provider, the namespace
//! authorization resolver, and a group source, and layers the
//! artifact-status policy on top: draft visibility, write-only-on-draft,
//! and promotion gating.

use crate::auth::AuthenticationProvider;
use crate::authz::AuthorizationProvider;
use crate::error::{Result, SecurityError};
use crate::groups::GroupSource;
use crate::metrics::{MetricsSnapshot, SecurityMetrics};
use crate::types::{
    Artifact, ArtifactStatus, PermissionLevel, Principal, UserGroup, UserRecord,
    ADMINISTRATORS_GROUP,
};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

const BASIC_PREFIX: &str = "Basic ";

/// Facade over authentication, authorization, and group membership.
pub struct SecurityManager {
    authentication: Arc<dyn AuthenticationProvider>,
    authorization: Arc<dyn AuthorizationProvider>,
    groups: Arc<dyn GroupSource>,
    metrics: Arc<SecurityMetrics>,
}

impl SecurityManager {
    pub fn new(
        authentication: Arc<dyn AuthenticationProvider>,
        authorization: Arc<dyn AuthorizationProvider>,
        groups: Arc<dyn GroupSource>,
        metrics: Arc<SecurityMetrics>,
    ) -> Self {
        Self {
            authentication,
            authorization,
            groups,
            metrics,
        }
    }

    /// Authenticate a user id and secret.
    ///
    /// An empty user id is the unauthenticated case and yields the
    /// anonymous principal. Invalid credentials also yield the anonymous
    /// principal rather than an error; provider failures still surface.
    pub fn authenticate(&self, user_id: &str, secret: &str) -> Result<Principal> {
        if user_id.is_empty() {
            return Ok(Principal::anonymous());
        }
        if !self.authentication.is_valid_user(user_id, secret)? {
            debug!(user = %user_id, "authentication rejected");
            return Ok(Principal::anonymous());
        }

        let mut principal =
            Principal::new(user_id).with_groups(self.groups.groups_for(user_id)?);
        if let Some(record) = self.authentication.get_user(user_id)? {
            principal = principal.with_record(record);
        }
        Ok(principal)
    }

    /// Authenticate from an HTTP `Authorization` header value.
    ///
    /// A missing or empty header is the unauthenticated case. Anything
    /// present must be a well-formed Basic credential.
    pub fn authenticate_basic(&self, header: Option<&str>) -> Result<Principal> {
        let header = match header {
            None => return Ok(Principal::anonymous()),
            Some(h) if h.is_empty() => return Ok(Principal::anonymous()),
            Some(h) => h,
        };
        let (user_id, secret) = decode_basic_credentials(header)?;
        self.authenticate(&user_id, &secret)
    }

    /// Whether the principal holds at least `required` on the namespace.
    /// Administrators bypass namespace rules entirely.
    pub fn is_authorized(
        &self,
        principal: &Principal,
        namespace: &str,
        required: PermissionLevel,
    ) -> Result<bool> {
        let started = Instant::now();
        let allowed = if self.is_administrator(principal) {
            true
        } else {
            self.authorization
                .resolve(principal, namespace)?
                .map(|effective| effective >= required)
                .unwrap_or(false)
        };
        self.metrics
            .record_authorization_check(allowed, started.elapsed());
        if !allowed {
            debug!(
                user = %principal.user_id,
                namespace = %namespace,
                required = %required,
                "authorization denied"
            );
        }
        Ok(allowed)
    }

    /// Whether the principal may read the artifact. Unreleased artifacts
    /// require draft visibility.
    pub fn is_read_authorized(&self, principal: &Principal, artifact: &dyn Artifact) -> Result<bool> {
        let required = match artifact.status() {
            ArtifactStatus::Draft | ArtifactStatus::UnderReview => PermissionLevel::ReadDraft,
            ArtifactStatus::Released | ArtifactStatus::Obsolete => PermissionLevel::ReadFinal,
        };
        self.is_authorized(principal, artifact.namespace(), required)
    }

    /// Whether the principal may modify the artifact. Only drafts are
    /// mutable; past that point no permission level suffices.
    pub fn is_write_authorized(
        &self,
        principal: &Principal,
        artifact: &dyn Artifact,
    ) -> Result<bool> {
        if artifact.status() != ArtifactStatus::Draft {
            return Ok(false);
        }
        self.is_authorized(principal, artifact.namespace(), PermissionLevel::Write)
    }

    /// Whether the principal may promote the artifact to its next
    /// lifecycle status. Obsolete artifacts have nowhere to go.
    pub fn is_promote_authorized(
        &self,
        principal: &Principal,
        artifact: &dyn Artifact,
    ) -> Result<bool> {
        if artifact.status() == ArtifactStatus::Obsolete {
            return Ok(false);
        }
        self.is_authorized(principal, artifact.namespace(), PermissionLevel::Write)
    }

    pub fn is_administrator(&self, principal: &Principal) -> bool {
        principal.groups.iter().any(|g| g == ADMINISTRATORS_GROUP)
    }

    /// The principal's effective permission on a namespace, without any
    /// administrator bypass.
    pub fn get_authorization(
        &self,
        principal: &Principal,
        namespace: &str,
    ) -> Result<Option<PermissionLevel>> {
        self.authorization.resolve(principal, namespace)
    }

    // Account management passes through to the authentication provider;
    // directory-backed providers reject the mutating operations.

    pub fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        self.authentication.get_user(user_id)
    }

    pub fn get_all_users(&self) -> Result<Vec<UserRecord>> {
        self.authentication.get_all_users()
    }

    pub fn search_candidate_users(
        &self,
        criteria: &str,
        max_results: usize,
    ) -> Result<Vec<UserRecord>> {
        self.authentication.search_candidate_users(criteria, max_results)
    }

    pub fn add_user(&self, record: UserRecord) -> Result<()> {
        self.authentication.add_user(record)
    }

    pub fn update_user(&self, record: UserRecord) -> Result<()> {
        self.authentication.update_user(record)
    }

    pub fn delete_user(&self, user_id: &str) -> Result<()> {
        self.authentication.delete_user(user_id)
    }

    pub fn set_user_password(&self, user_id: &str, secret: &str) -> Result<()> {
        self.authentication.set_password(user_id, secret)
    }

    pub fn group_names(&self) -> Result<Vec<String>> {
        self.groups.group_names()
    }

    pub fn group(&self, name: &str) -> Result<Option<UserGroup>> {
        self.groups.group(name)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Decode an HTTP Basic `Authorization` header into user id and secret.
///
/// The payload splits at the first colon, so secrets may contain colons.
/// A payload without a colon is a bare user id with an empty secret.
pub fn decode_basic_credentials(header: &str) -> Result<(String, String)> {
    let encoded = header.strip_prefix(BASIC_PREFIX).ok_or_else(|| {
        SecurityError::InvalidCredentialsFormat(
            "authorization header is not a Basic credential".to_string(),
        )
    })?;

    let decoded = BASE64.decode(encoded.trim()).map_err(|e| {
        SecurityError::InvalidCredentialsFormat(format!("invalid base64 payload: {e}"))
    })?;
    let decoded = String::from_utf8(decoded).map_err(|e| {
        warn!("basic credential payload is not UTF-8");
        SecurityError::InvalidCredentialsFormat(format!("credential is not UTF-8: {e}"))
    })?;

    Ok(match decoded.split_once(':') {
        Some((user, secret)) => (user.to_string(), secret.to_string()),
        None => (decoded, String::new()),
    })
}
