//! Status engine: three-way comparison over HEAD/index/worktree (§4.12).

use std::collections::BTreeMap;
use std::path::Path;

use ignore::WalkBuilder;

use crate::digest::Digest;
use crate::error::Result;
use crate::index::IndexEntry;
use crate::store::ObjectStore;
use crate::worktree::flatten_tree;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Status {
    pub staged_added: Vec<String>,
    pub staged_modified: Vec<String>,
    pub staged_deleted: Vec<String>,
    pub unstaged_modified: Vec<String>,
    pub unstaged_deleted: Vec<String>,
    pub untracked: Vec<String>,
}

/// Walks the working tree, skipping engine-internal directories (`objects`,
/// `refs`, and the rest of `repo_root`'s own bookkeeping files) per §6.
fn list_working_tree(repo_root: &Path) -> Result<Vec<String>> {
    let mut paths = Vec::new();
    let walker = WalkBuilder::new(repo_root).hidden(false).build();
    for entry in walker {
        let entry = entry.map_err(|e| {
            crate::error::GitError::io_at(repo_root, std::io::Error::other(e.to_string()))
        })?;
        if entry.depth() == 0 {
            continue;
        }
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let rel = path
            .strip_prefix(repo_root)
            .expect("walker yields paths under repo_root");
        if is_engine_internal(rel) {
            continue;
        }
        if let Some(rel_str) = rel.to_str() {
            paths.push(rel_str.replace(std::path::MAIN_SEPARATOR, "/"));
        }
    }
    paths.sort();
    Ok(paths)
}

fn is_engine_internal(rel: &Path) -> bool {
    matches!(
        rel.components().next().and_then(|c| c.as_os_str().to_str()),
        Some("objects") | Some("refs")
    ) || matches!(
        rel.to_str(),
        Some("HEAD") | Some("index") | Some("index.lock") | Some("config")
    )
}

fn blob_digest_of_file(repo_root: &Path, rel: &str) -> Result<Digest> {
    let bytes = std::fs::read(repo_root.join(rel))
        .map_err(|e| crate::error::GitError::io_at(rel, e))?;
    Ok(crate::digest::hash_framed(crate::digest::ObjectKind::Blob, &bytes).0)
}

/// Computes the full three-way status. `head_tree` is `None` before the
/// first commit (so everything staged shows as `added`).
pub fn status(
    repo_root: &Path,
    store: &ObjectStore,
    head_tree: Option<Digest>,
) -> Result<Status> {
    let committed: BTreeMap<String, IndexEntry> = match head_tree {
        Some(tree) => flatten_tree(store, tree)?,
        None => BTreeMap::new(),
    };
    let index = crate::index::read_index(repo_root)?;
    let working_paths = list_working_tree(repo_root)?;

    let mut out = Status::default();

    for (path, index_entry) in &index {
        match committed.get(path) {
            None => out.staged_added.push(path.clone()),
            Some(head_entry) if head_entry.digest != index_entry.digest => {
                out.staged_modified.push(path.clone())
            }
            Some(_) => {}
        }
    }
    for path in committed.keys() {
        if !index.contains_key(path) {
            out.staged_deleted.push(path.clone());
        }
    }

    let working_set: std::collections::BTreeSet<&String> = working_paths.iter().collect();
    for (path, index_entry) in &index {
        if !working_set.contains(path) {
            out.unstaged_deleted.push(path.clone());
            continue;
        }
        let on_disk = blob_digest_of_file(repo_root, path)?;
        if on_disk != index_entry.digest {
            out.unstaged_modified.push(path.clone());
        }
    }

    for path in &working_paths {
        if !index.contains_key(path) {
            out.untracked.push(path.clone());
        }
    }

    out.staged_added.sort();
    out.staged_modified.sort();
    out.staged_deleted.sort();
    out.unstaged_modified.sort();
    out.unstaged_deleted.sort();
    out.untracked.sort();

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::{ObjectKind, hash_framed};
    use crate::tree::FileMode;

    #[test]
    fn untracked_file_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        std::fs::write(dir.path().join("a.txt"), "content").unwrap();

        let st = status(dir.path(), &store, None).unwrap();
        assert_eq!(st.untracked, vec!["a.txt".to_string()]);
    }

    #[test]
    fn staged_added_when_not_in_head() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        std::fs::write(dir.path().join("a.txt"), "content").unwrap();
        let (digest, framed) = hash_framed(ObjectKind::Blob, b"content");
        store.write(&digest, &framed).unwrap();
        crate::index::add_entry(dir.path(), "a.txt", digest, FileMode::Regular).unwrap();

        let st = status(dir.path(), &store, None).unwrap();
        assert_eq!(st.staged_added, vec!["a.txt".to_string()]);
        assert!(st.untracked.is_empty());
    }

    #[test]
    fn unstaged_modified_when_worktree_diverges_from_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let (digest, framed) = hash_framed(ObjectKind::Blob, b"original");
        store.write(&digest, &framed).unwrap();
        crate::index::add_entry(dir.path(), "a.txt", digest, FileMode::Regular).unwrap();
        std::fs::write(dir.path().join("a.txt"), "changed").unwrap();

        let st = status(dir.path(), &store, None).unwrap();
        assert_eq!(st.unstaged_modified, vec!["a.txt".to_string()]);
    }

    #[test]
    fn unstaged_deleted_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let (digest, framed) = hash_framed(ObjectKind::Blob, b"gone");
        store.write(&digest, &framed).unwrap();
        crate::index::add_entry(dir.path(), "a.txt", digest, FileMode::Regular).unwrap();

        let st = status(dir.path(), &store, None).unwrap();
        assert_eq!(st.unstaged_deleted, vec!["a.txt".to_string()]);
    }

    #[test]
    fn engine_internal_paths_never_shown() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join("objects/ab")).unwrap();
        std::fs::write(dir.path().join("objects/ab/cdef"), "x").unwrap();
        std::fs::write(dir.path().join("HEAD"), "ref: refs/heads/main\n").unwrap();

        let st = status(dir.path(), &store, None).unwrap();
        assert!(st.untracked.is_empty());
    }
}
