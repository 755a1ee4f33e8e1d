//! Permission Record Persistence
//!
//! One JSON document per namespace node under the configured rules
//! directory. File names are derived from a digest of the namespace URI
//! so arbitrary URIs never produce hostile paths; the global record has
//! a fixed name.

use super::rules::NamespacePermissionRecord;
use crate::changeset::ChangeSet;
use crate::error::{Result, SecurityError};

use ring::digest;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const GLOBAL_RECORD_FILE: &str = "global.json";

/// Backing storage for namespace permission records.
pub trait PermissionStore: Send + Sync {
    /// Load the record for a namespace node, `None` namespace meaning the
    /// global root. Absent records are `Ok(None)`.
    fn load(&self, namespace: Option<&str>) -> Result<Option<NamespacePermissionRecord>>;

    /// Persist a record atomically.
    fn save(&self, record: &NamespacePermissionRecord) -> Result<()>;

    /// Whether any record has ever been persisted.
    fn has_any_records(&self) -> Result<bool>;
}

/// File-per-record store rooted at a rules directory.
pub struct FilePermissionStore {
    dir: PathBuf,
}

impl FilePermissionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self, namespace: Option<&str>) -> PathBuf {
        match namespace {
            None => self.dir.join(GLOBAL_RECORD_FILE),
            Some(ns) => {
                let hash = digest::digest(&digest::SHA256, ns.as_bytes());
                self.dir.join(format!("ns-{}.json", hex::encode(hash.as_ref())))
            }
        }
    }

    fn read_record(path: &Path) -> Result<Option<NamespacePermissionRecord>> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SecurityError::Io(e)),
        }
    }
}

impl PermissionStore for FilePermissionStore {
    fn load(&self, namespace: Option<&str>) -> Result<Option<NamespacePermissionRecord>> {
        Self::read_record(&self.record_path(namespace))
    }

    fn save(&self, record: &NamespacePermissionRecord) -> Result<()> {
        let path = self.record_path(record.namespace.as_deref());
        let contents = serde_json::to_vec_pretty(record)?;

        let mut changes = ChangeSet::begin();
        changes.stage(&path, &contents)?;
        changes.commit()?;
        debug!(
            namespace = record.namespace.as_deref().unwrap_or("<global>"),
            path = %path.display(),
            "persisted permission record"
        );
        Ok(())
    }

    fn has_any_records(&self) -> Result<bool> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(SecurityError::Io(e)),
        };
        for entry in entries {
            let entry = entry?;
            if entry.path().extension().map(|e| e == "json").unwrap_or(false) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PermissionLevel;

    #[test]
    fn test_missing_record_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePermissionStore::new(dir.path());
        assert!(store.load(Some("http://example.org/ns")).unwrap().is_none());
        assert!(store.load(None).unwrap().is_none());
        assert!(!store.has_any_records().unwrap());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePermissionStore::new(dir.path());

        let record = NamespacePermissionRecord::new("http://example.org/ns")
            .with_grant(PermissionLevel::Write, "alice");
        store.save(&record).unwrap();

        assert_eq!(store.load(Some("http://example.org/ns")).unwrap(), Some(record));
        assert!(store.has_any_records().unwrap());
    }

    #[test]
    fn test_global_record_has_fixed_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePermissionStore::new(dir.path());

        store.save(&NamespacePermissionRecord::default_global()).unwrap();
        assert!(dir.path().join("global.json").exists());
        assert_eq!(
            store.load(None).unwrap(),
            Some(NamespacePermissionRecord::default_global())
        );
    }

    #[test]
    fn test_distinct_namespaces_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePermissionStore::new(dir.path());

        let a = NamespacePermissionRecord::new("http://example.org/a")
            .with_grant(PermissionLevel::ReadFinal, "alice");
        let b = NamespacePermissionRecord::new("http://example.org/b")
            .with_grant(PermissionLevel::Write, "bob");
        store.save(&a).unwrap();
        store.save(&b).unwrap();

        assert_eq!(store.load(Some("http://example.org/a")).unwrap(), Some(a));
        assert_eq!(store.load(Some("http://example.org/b")).unwrap(), Some(b));
    }
}
