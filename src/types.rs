use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Reserved user id for unauthenticated callers.
///
/// A rule naming this id applies to every principal, authenticated or not.
pub const ANONYMOUS_USER_ID: &str = "anonymous";

/// Reserved group whose members bypass namespace authorization entirely.
pub const ADMINISTRATORS_GROUP: &str = "administrators";

/// Permission levels, totally ordered by increasing breadth of access.
///
/// `ReadFinal` grants access to released artifacts only, `ReadDraft` adds
/// work-in-progress visibility, and `Write` subsumes both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionLevel {
    ReadFinal,
    ReadDraft,
    Write,
}

impl PermissionLevel {
    /// Numeric rank; higher means broader access.
    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PermissionLevel::ReadFinal => "READ_FINAL",
            PermissionLevel::ReadDraft => "READ_DRAFT",
            PermissionLevel::Write => "WRITE",
        };
        f.write_str(s)
    }
}

/// Lifecycle status of a versioned artifact, as reported by the
/// repository's artifact model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactStatus {
    Draft,
    UnderReview,
    Released,
    Obsolete,
}

/// Minimal view of a repository artifact needed for authorization checks.
///
/// The artifact/version model itself is an external collaborator; this
/// core only needs the owning namespace and the lifecycle status.
pub trait Artifact {
    fn namespace(&self) -> &str;
    fn status(&self) -> ArtifactStatus;
}

/// A managed user account.
///
/// `user_id` is the identity key: unique, case-sensitive, non-empty.
/// `encrypted_password` holds an opaque digest and is present only for
/// locally managed accounts; directory-backed records never carry one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_password: Option<String>,
}

impl UserRecord {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            first_name: None,
            last_name: None,
            email: None,
            encrypted_password: None,
        }
    }

    fn sort_key(&self) -> (&Option<String>, &Option<String>, &Option<String>, &str) {
        (&self.last_name, &self.first_name, &self.email, &self.user_id)
    }
}

// Persisted lists are kept sorted by (last name, first name, email, user id);
// `None` sorts before any value at each tier, which Option's ordering gives us.
impl Ord for UserRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for UserRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A named group of users, read-only from this core's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroup {
    pub name: String,
    pub members: BTreeSet<String>,
}

impl UserGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: BTreeSet::new(),
        }
    }

    pub fn with_member(mut self, user_id: impl Into<String>) -> Self {
        self.members.insert(user_id.into());
        self
    }
}

/// A resolved identity: a user record plus its assigned groups.
///
/// Unauthenticated callers get the distinguished anonymous principal
/// rather than an absent value, so consumers never null-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub groups: Vec<String>,
    pub record: Option<UserRecord>,
}

impl Principal {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            groups: Vec::new(),
            record: None,
        }
    }

    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS_USER_ID)
    }

    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_record(mut self, record: UserRecord) -> Self {
        self.record = Some(record);
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id == ANONYMOUS_USER_ID
    }

    /// Whether a grant/deny subject applies to this principal.
    ///
    /// A subject matches on the user id, on any assigned group, or when it
    /// is the anonymous wildcard.
    pub fn matches_subject(&self, subject: &str) -> bool {
        subject == ANONYMOUS_USER_ID
            || subject == self.user_id
            || self.groups.iter().any(|g| g == subject)
    }
}
