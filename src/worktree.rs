//! Working-tree sync: tree <-> filesystem materialization (§4.9).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::digest::{Digest, ObjectKind, hash_framed};
use crate::error::{GitError, Result};
use crate::index::IndexEntry;
use crate::store::ObjectStore;
use crate::tree::FileMode;

/// Recursively descends a tree, building the flat `path -> blob digest` map
/// (§4.9's first paragraph). Bounded by the same depth cap as tree-build.
const MAX_DEPTH: usize = 1000;

pub fn flatten_tree(store: &ObjectStore, root: Digest) -> Result<BTreeMap<String, IndexEntry>> {
    let mut out = BTreeMap::new();
    flatten_into(store, root, String::new(), &mut out, 0)?;
    Ok(out)
}

fn flatten_into(
    store: &ObjectStore,
    tree_digest: Digest,
    prefix: String,
    out: &mut BTreeMap<String, IndexEntry>,
    depth: usize,
) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(GitError::TooDeep);
    }
    let (kind, content) = store.read(&tree_digest)?;
    if kind != ObjectKind::Tree {
        return Err(GitError::Corrupted(format!(
            "expected tree at {tree_digest}, got {}",
            kind.as_str()
        )));
    }
    for entry in crate::tree::parse_tree(&content)? {
        let full_path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            format!("{prefix}/{}", entry.name)
        };
        if entry.mode.is_dir() {
            flatten_into(store, entry.hash, full_path, out, depth + 1)?;
        } else {
            out.insert(
                full_path,
                IndexEntry {
                    digest: entry.hash,
                    mode: entry.mode,
                },
            );
        }
    }
    Ok(())
}

fn blob_digest_of_bytes(bytes: &[u8]) -> Digest {
    hash_framed(ObjectKind::Blob, bytes).0
}

/// Recomputes the on-disk digest for every indexed path whose file still
/// exists and compares it to the indexed digest. Returns the paths that
/// differ. Used as the checkout-safety dirty-guard (§4.9).
pub fn dirty_paths(
    repo_root: &Path,
    index: &BTreeMap<String, IndexEntry>,
) -> Result<Vec<String>> {
    let mut dirty = Vec::new();
    for (path, entry) in index {
        let full = repo_root.join(path);
        if !full.is_file() {
            continue;
        }
        let bytes = fs::read(&full).map_err(|e| GitError::io_at(&full, e))?;
        if blob_digest_of_bytes(&bytes) != entry.digest {
            dirty.push(path.clone());
        }
    }
    Ok(dirty)
}

/// Applies a flat map to the working tree, replacing `current_index`: (1)
/// removes files no longer present, cleaning empty parents; (2) writes
/// every file in `target`; (3) returns the map the index should be
/// rewritten to. Callers MUST run `dirty_paths` first per the checkout
/// safety contract — this function performs no such check itself.
pub fn materialize(
    repo_root: &Path,
    store: &ObjectStore,
    current_index: &BTreeMap<String, IndexEntry>,
    target: &BTreeMap<String, IndexEntry>,
) -> Result<()> {
    for path in current_index.keys() {
        if target.contains_key(path) {
            continue;
        }
        let full = repo_root.join(path);
        if full.is_file() {
            fs::remove_file(&full).map_err(|e| GitError::io_at(&full, e))?;
            clean_empty_parents(repo_root, &full);
        }
    }

    for (path, entry) in target {
        let full = repo_root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| GitError::io_at(parent, e))?;
        }
        let (_, content) = store.read(&entry.digest)?;
        fs::write(&full, &content).map_err(|e| GitError::io_at(&full, e))?;
        set_mode(&full, entry.mode)?;
    }

    log::info!("materialized {} paths into working tree", target.len());
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: FileMode) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let bits = match mode {
        FileMode::Executable => 0o755,
        _ => 0o644,
    };
    let perms = fs::Permissions::from_mode(bits);
    fs::set_permissions(path, perms).map_err(|e| GitError::io_at(path, e))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: FileMode) -> Result<()> {
    Ok(())
}

fn clean_empty_parents(repo_root: &Path, removed_file: &Path) {
    let mut dir = removed_file.parent();
    while let Some(d) = dir {
        if d == repo_root || !d.starts_with(repo_root) {
            break;
        }
        match fs::read_dir(d) {
            Ok(mut entries) if entries.next().is_none() => {
                let _ = fs::remove_dir(d);
                dir = d.parent();
            }
            _ => break,
        }
    }
}
