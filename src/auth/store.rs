//! User Record Persistence
//!
//! The persisted account list is always written whole through a
//! change-set: the lists are small and full-file replacement rules out
//! partial-update corruption. `last_modified` exposes the backing store's
//! modification time so the in-memory registry can refresh by watermark.

use crate::changeset::ChangeSet;
use crate::error::Result;
use crate::types::UserRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::debug;

/// Persistence seam for the local account store.
pub trait UserStore: Send + Sync {
    /// Load the full persisted list; an absent backing file is an empty list.
    fn load(&self) -> Result<Vec<UserRecord>>;

    /// Atomically replace the full persisted list.
    fn save(&self, users: &[UserRecord]) -> Result<()>;

    /// Modification time of the backing store, `None` when nothing has
    /// been persisted yet.
    fn last_modified(&self) -> Result<Option<SystemTime>>;
}

/// On-disk JSON document wrapping the account list.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedUserList {
    saved_at: DateTime<Utc>,
    users: Vec<UserRecord>,
}

/// File-backed `UserStore` writing one JSON document via change-sets.
pub struct FileUserStore {
    path: PathBuf,
}

impl FileUserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl UserStore for FileUserStore {
    fn load(&self) -> Result<Vec<UserRecord>> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let document: PersistedUserList = serde_json::from_slice(&raw)?;
        Ok(document.users)
    }

    fn save(&self, users: &[UserRecord]) -> Result<()> {
        let document = PersistedUserList {
            saved_at: Utc::now(),
            users: users.to_vec(),
        };
        let contents = serde_json::to_vec_pretty(&document)?;

        let mut changeset = ChangeSet::begin();
        changeset.stage(&self.path, &contents)?;
        changeset.commit()?;

        debug!(path = %self.path.display(), count = users.len(), "persisted user list");
        Ok(())
    }

    fn last_modified(&self) -> Result<Option<SystemTime>> {
        match std::fs::metadata(&self.path) {
            Ok(metadata) => Ok(Some(metadata.modified()?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
