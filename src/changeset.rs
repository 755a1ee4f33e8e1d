//! Atomic File Change-Sets
//!
//! The account list and the namespace permission records are always
//! rewritten whole: a change-set stages complete replacement files next to
//! their targets and moves them into place on commit. A failed commit
//! rolls back the staged files and surfaces `PersistenceFailure`; a failed
//! rollback is logged but never re-raised.

use crate::error::{Result, SecurityError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use uuid::Uuid;

struct StagedFile {
    target: PathBuf,
    temp: NamedTempFile,
}

/// A unit of file-system writes that either fully commits or fully rolls back.
pub struct ChangeSet {
    id: Uuid,
    staged: Vec<StagedFile>,
}

impl ChangeSet {
    pub fn begin() -> Self {
        let id = Uuid::new_v4();
        debug!(changeset = %id, "beginning change-set");
        Self {
            id,
            staged: Vec::new(),
        }
    }

    /// Stage a full replacement of `target`. The temporary file lives in the
    /// target's directory so the final rename stays on one filesystem.
    pub fn stage(&mut self, target: impl AsRef<Path>, contents: &[u8]) -> Result<()> {
        let target = target.as_ref().to_path_buf();
        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(contents)?;
        temp.as_file().sync_all()?;

        debug!(changeset = %self.id, target = %target.display(), bytes = contents.len(), "staged file");
        self.staged.push(StagedFile { target, temp });
        Ok(())
    }

    /// Move every staged file into place. On the first failure the
    /// remaining staged files are discarded and the error surfaces.
    pub fn commit(mut self) -> Result<()> {
        let id = self.id;
        for staged in self.staged.drain(..) {
            if let Err(e) = staged.temp.persist(&staged.target) {
                warn!(changeset = %id, target = %staged.target.display(), error = %e.error,
                    "change-set commit failed, rolling back");
                // Remaining temps are removed when `self` drops.
                return Err(SecurityError::PersistenceFailure(format!(
                    "failed to commit {}: {}",
                    staged.target.display(),
                    e.error
                )));
            }
        }
        debug!(changeset = %id, "change-set committed");
        Ok(())
    }

    /// Discard all staged files without touching their targets.
    pub fn rollback(mut self) {
        let id = self.id;
        for staged in self.staged.drain(..) {
            if let Err(e) = staged.temp.close() {
                // Rollback failures are logged, never re-raised.
                warn!(changeset = %id, error = %e, "failed to remove staged file during rollback");
            }
        }
        debug!(changeset = %id, "change-set rolled back");
    }
}
