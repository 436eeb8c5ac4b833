//! Exclusive-mutation locking for the index and refs (§5).
//!
//! The engine assumes one writer process, but mutation of shared,
//! non-content-addressed state (the index, a given ref) still needs an
//! exclusive lock so two concurrent writers don't interleave. This is a
//! plain `create_new` lock file, held for the duration of the mutating call
//! and removed on drop — the same create-then-finalize idiom the store uses
//! for atomic object writes, applied to locking.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{GitError, Result};

pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    /// Acquires the lock at `path`. Fails fast (does not block) if another
    /// process already holds it (P14).
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| GitError::io_at(parent, e))?;
        }
        match File::options().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(LockGuard { path }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(GitError::io_at(&path, e))
            }
            Err(e) => Err(GitError::io_at(&path, e)),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("failed to remove lock file {:?}: {e}", self.path);
        }
    }
}

pub fn index_lock_path(repo_root: &Path) -> PathBuf {
    repo_root.join("index.lock")
}

pub fn ref_lock_path(repo_root: &Path, ref_path: &str) -> PathBuf {
    repo_root.join(format!("{ref_path}.lock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.lock");
        let guard = LockGuard::acquire(&path).unwrap();
        let err = LockGuard::acquire(&path).unwrap_err();
        assert!(matches!(err, GitError::Io { .. }));
        drop(guard);
        // once dropped, the lock file is gone and a new acquire succeeds
        LockGuard::acquire(&path).unwrap();
    }
}
