//! Ref layer: `HEAD` and `refs/heads/<branch>` (§4.7).

use std::fs;
use std::path::{Path, PathBuf};

use crate::digest::Digest;
use crate::error::{GitError, Result};
use crate::lock::{LockGuard, ref_lock_path};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Head {
    Branch { name: String, digest: Option<Digest> },
    Detached { digest: Digest },
}

fn heads_dir(repo_root: &Path) -> PathBuf {
    repo_root.join("refs").join("heads")
}

fn branch_path(repo_root: &Path, name: &str) -> PathBuf {
    heads_dir(repo_root).join(name)
}

fn head_path(repo_root: &Path) -> PathBuf {
    repo_root.join("HEAD")
}

/// Reads `HEAD`. A branch whose backing file doesn't exist yet is the
/// sole legal pre-first-commit state (Invariant R1); `digest` is `None`
/// in that case.
pub fn get_head(repo_root: &Path) -> Result<Head> {
    let path = head_path(repo_root);
    let text = fs::read_to_string(&path).map_err(|e| GitError::io_at(&path, e))?;
    let text = text.trim();

    if let Some(branch_ref) = text.strip_prefix("ref: ") {
        let name = branch_ref
            .strip_prefix("refs/heads/")
            .ok_or_else(|| GitError::InvalidRef(branch_ref.to_string()))?
            .to_string();
        let digest = resolve_ref(repo_root, &format!("refs/heads/{name}"))?;
        Ok(Head::Branch { name, digest })
    } else {
        let digest = Digest::from_hex(text)?;
        Ok(Head::Detached { digest })
    }
}

pub fn set_head_symbolic(repo_root: &Path, branch_name: &str) -> Result<()> {
    let path = head_path(repo_root);
    fs::write(&path, format!("ref: refs/heads/{branch_name}\n"))
        .map_err(|e| GitError::io_at(&path, e))?;
    log::info!("HEAD -> refs/heads/{branch_name}");
    Ok(())
}

pub fn set_head_detached(repo_root: &Path, digest: Digest) -> Result<()> {
    let path = head_path(repo_root);
    fs::write(&path, format!("{}\n", digest.to_hex())).map_err(|e| GitError::io_at(&path, e))?;
    log::info!("HEAD detached at {digest}");
    Ok(())
}

/// Writes `<hex>\n` to `ref_path` (relative to the repo root, e.g.
/// `refs/heads/main`), creating intermediate directories as needed. Takes
/// the per-ref lock for the duration of the write.
pub fn update_ref(repo_root: &Path, ref_path: &str, digest: Digest) -> Result<()> {
    let _guard = LockGuard::acquire(ref_lock_path(repo_root, ref_path))?;
    let full_path = repo_root.join(ref_path);
    if let Some(parent) = full_path.parent() {
        fs::create_dir_all(parent).map_err(|e| GitError::io_at(parent, e))?;
    }
    fs::write(&full_path, format!("{}\n", digest.to_hex()))
        .map_err(|e| GitError::io_at(&full_path, e))?;
    log::debug!("updated ref {ref_path} -> {digest}");
    Ok(())
}

pub fn resolve_ref(repo_root: &Path, ref_path: &str) -> Result<Option<Digest>> {
    let full_path = repo_root.join(ref_path);
    match fs::read_to_string(&full_path) {
        Ok(text) => Ok(Some(Digest::from_hex(text.trim())?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(GitError::io_at(&full_path, e)),
    }
}

pub fn list_branches(repo_root: &Path) -> Result<Vec<String>> {
    let dir = heads_dir(repo_root);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(&dir).map_err(|e| GitError::io_at(&dir, e))? {
        let entry = entry.map_err(|e| GitError::io_at(&dir, e))?;
        if entry.file_type().map_err(|e| GitError::io_at(&dir, e))?.is_file() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

pub fn current_branch(repo_root: &Path) -> Result<Option<String>> {
    match get_head(repo_root)? {
        Head::Branch { name, .. } => Ok(Some(name)),
        Head::Detached { .. } => Ok(None),
    }
}

pub fn create_branch(repo_root: &Path, name: &str, at: Digest) -> Result<()> {
    let path = branch_path(repo_root, name);
    if path.is_file() {
        return Err(GitError::BranchAlreadyExists(name.to_string()));
    }
    update_ref(repo_root, &format!("refs/heads/{name}"), at)?;
    log::info!("created branch {name}");
    Ok(())
}

pub fn delete_branch(repo_root: &Path, name: &str) -> Result<()> {
    if current_branch(repo_root)?.as_deref() == Some(name) {
        return Err(GitError::BranchInUse(name.to_string()));
    }
    let path = branch_path(repo_root, name);
    fs::remove_file(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            GitError::InvalidRef(name.to_string())
        } else {
            GitError::io_at(&path, e)
        }
    })
}
