//! Crash-safe file replacement.
//!
//! [`commit`] swaps a fully written temp file into its final location while
//! keeping the previous file as a `.bak` companion. The returned
//! [`CommitHandle`] either restores the previous state ([`CommitHandle::rollback`])
//! or discards the backup once the caller's whole group of files has landed
//! ([`CommitHandle::cleanup`]). At no point is a partially written target
//! visible under the target path.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    error::FileSystemResult,
    fs::{rename, safe_remove, with_suffix},
};

pub const BACKUP_SUFFIX: &str = ".bak";

/// Returns the backup path used for `target` while a commit is in flight.
pub fn backup_path<P: AsRef<Path>>(target: P) -> PathBuf {
    with_suffix(target, BACKUP_SUFFIX)
}

/// Record of a single committed file.
#[derive(Debug)]
#[must_use = "a commit must be either rolled back or cleaned up"]
pub struct CommitHandle {
    temp: PathBuf,
    target: PathBuf,
    backup: PathBuf,
    moved: bool,
    installed: bool,
}

impl CommitHandle {
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn backup(&self) -> &Path {
        &self.backup
    }

    /// Restores the state that existed before [`commit`].
    ///
    /// Every step is attempted even if an earlier one fails; the first error is returned.
    pub fn rollback(self) -> FileSystemResult<()> {
        let mut first_err = None;

        if self.installed {
            if let Err(err) = safe_remove(&self.target) {
                first_err.get_or_insert(err);
            }
        }

        if self.moved {
            if let Err(err) = rename(&self.backup, &self.target) {
                warn!("{err}");
                first_err.get_or_insert(err);
            }
        }

        if let Err(err) = safe_remove(&self.temp) {
            first_err.get_or_insert(err);
        }

        debug!("rolled back {}", self.target.display());

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Deletes the backup. Call only once the whole commit group succeeded.
    pub fn cleanup(self) -> FileSystemResult<()> {
        safe_remove(&self.backup)
    }
}

/// Moves `temp` into `target`, keeping any previous `target` as a backup.
///
/// A stale backup from an earlier interrupted run is removed first. If the final
/// rename fails, the backup is moved back so `target` is left untouched.
///
/// # Errors
///
/// Returns the [`crate::error::FileSystemError`] of the step that failed. On error no
/// rollback is needed: the target is already back in its previous state.
///
/// # Example
///
/// ```no_run
/// use titledb_utils::atomic::commit;
///
/// let handle = commit("db/titles.pack.download", "db/titles.pack").unwrap();
/// // ... commit the rest of the group ...
/// handle.cleanup().unwrap();
/// ```
pub fn commit<P: AsRef<Path>, Q: AsRef<Path>>(temp: P, target: Q) -> FileSystemResult<CommitHandle> {
    let temp = temp.as_ref().to_path_buf();
    let target = target.as_ref().to_path_buf();
    let backup = backup_path(&target);

    safe_remove(&backup)?;

    let mut handle = CommitHandle {
        temp,
        target,
        backup,
        moved: false,
        installed: false,
    };

    if handle.target.exists() {
        rename(&handle.target, &handle.backup)?;
        handle.moved = true;
    }

    if let Err(err) = rename(&handle.temp, &handle.target) {
        if handle.moved {
            if let Err(restore_err) = rename(&handle.backup, &handle.target) {
                warn!("{restore_err}");
            }
        }
        return Err(err);
    }
    handle.installed = true;

    debug!(
        "committed {} -> {}",
        handle.temp.display(),
        handle.target.display()
    );

    Ok(handle)
}
