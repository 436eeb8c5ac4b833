//! Merge engine: fast-forward and three-way with conflict markers (§4.11).

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::commit::{Ident, build_commit};
use crate::digest::{Digest, ObjectKind};
use crate::error::{GitError, Result};
use crate::history::{is_ancestor, merge_base};
use crate::index::IndexEntry;
use crate::refs::update_ref;
use crate::store::ObjectStore;
use crate::tree::FileMode;
use crate::tree_builder::build_tree_from_index;
use crate::worktree::{dirty_paths, flatten_tree, materialize};

#[derive(Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    AlreadyUpToDate,
    FastForward { to: Digest },
    Merged { commit: Digest },
}

/// Runs the full merge decision tree for merging `theirs` (named
/// `theirs_name`, e.g. a branch) into the branch currently pointed to by
/// `ours_branch_ref` (e.g. `refs/heads/main`) at commit digest `ours`.
pub fn merge(
    repo_root: &Path,
    store: &ObjectStore,
    ours_branch_ref: &str,
    ours: Digest,
    theirs: Digest,
    theirs_name: &str,
    committer: Ident,
) -> Result<MergeOutcome> {
    if ours == theirs || is_ancestor(store, theirs, ours)? {
        log::info!("merge: already up to date");
        return Ok(MergeOutcome::AlreadyUpToDate);
    }

    if is_ancestor(store, ours, theirs)? {
        log::info!("merge: fast-forwarding to {theirs}");
        return fast_forward(repo_root, store, ours_branch_ref, theirs);
    }

    three_way_merge(
        repo_root,
        store,
        ours_branch_ref,
        ours,
        theirs,
        theirs_name,
        committer,
    )
}

fn fast_forward(
    repo_root: &Path,
    store: &ObjectStore,
    ours_branch_ref: &str,
    theirs: Digest,
) -> Result<MergeOutcome> {
    let (_, content) = store.read(&theirs)?;
    let commit = crate::commit::parse_commit(&content)?;

    let current_index = crate::index::read_index(repo_root)?;
    let dirty = dirty_paths(repo_root, &current_index)?;
    if !dirty.is_empty() {
        return Err(GitError::DirtyWorkingTree(dirty));
    }

    let target = flatten_tree(store, commit.tree)?;
    materialize(repo_root, store, &current_index, &target)?;
    crate::index::write_index(repo_root, &target)?;

    update_ref(repo_root, ours_branch_ref, theirs)?;
    Ok(MergeOutcome::FastForward { to: theirs })
}

fn three_way_merge(
    repo_root: &Path,
    store: &ObjectStore,
    ours_branch_ref: &str,
    ours: Digest,
    theirs: Digest,
    theirs_name: &str,
    committer: Ident,
) -> Result<MergeOutcome> {
    let base = merge_base(store, ours, theirs)?.ok_or(GitError::UnrelatedHistories)?;

    let base_tree = commit_tree(store, base)?;
    let ours_tree = commit_tree(store, ours)?;
    let theirs_tree = commit_tree(store, theirs)?;

    let base_map = flatten_tree(store, base_tree)?;
    let ours_map = flatten_tree(store, ours_tree)?;
    let theirs_map = flatten_tree(store, theirs_tree)?;

    let mut paths: BTreeSet<String> = BTreeSet::new();
    paths.extend(base_map.keys().cloned());
    paths.extend(ours_map.keys().cloned());
    paths.extend(theirs_map.keys().cloned());

    let mut merged: BTreeMap<String, IndexEntry> = BTreeMap::new();
    let mut conflicts = Vec::new();

    for path in paths {
        let base_e = base_map.get(&path);
        let ours_e = ours_map.get(&path);
        let theirs_e = theirs_map.get(&path);

        match (base_e, ours_e, theirs_e) {
            (_, Some(o), Some(t)) if digests_eq(o, t) => {
                merged.insert(path, o.clone());
            }
            (Some(b), Some(o), Some(t)) if digests_eq(b, o) => {
                merged.insert(path, t.clone());
            }
            (Some(b), Some(o), Some(t)) if digests_eq(b, t) => {
                merged.insert(path, o.clone());
            }
            (Some(_), Some(o), Some(t)) => {
                let blob = build_conflict_blob(store, Some(o), Some(t), theirs_name)?;
                merged.insert(path.clone(), blob);
                conflicts.push(path);
            }
            (None, None, Some(t)) => {
                merged.insert(path, t.clone());
            }
            (None, Some(o), None) => {
                merged.insert(path, o.clone());
            }
            (None, Some(o), Some(t)) => {
                let blob = build_conflict_blob(store, Some(o), Some(t), theirs_name)?;
                merged.insert(path.clone(), blob);
                conflicts.push(path);
            }
            (Some(_), None, None) => {
                // deleted on both sides
            }
            (Some(b), None, Some(t)) if digests_eq(b, t) => {
                // deleted on ours, unchanged on theirs
            }
            (Some(b), Some(o), None) if digests_eq(b, o) => {
                // deleted on theirs, unchanged on ours
            }
            (Some(_), None, Some(t)) => {
                let blob = build_conflict_blob(store, None, Some(t), theirs_name)?;
                merged.insert(path.clone(), blob);
                conflicts.push(path);
            }
            (Some(_), Some(o), None) => {
                let blob = build_conflict_blob(store, Some(o), None, theirs_name)?;
                merged.insert(path.clone(), blob);
                conflicts.push(path);
            }
            (None, None, None) => unreachable!("path came from one of the three maps"),
        }
    }

    let root_tree = build_tree_from_index(store, &merged)?;

    let current_index = crate::index::read_index(repo_root)?;
    let dirty = dirty_paths(repo_root, &current_index)?;
    if !dirty.is_empty() {
        return Err(GitError::DirtyWorkingTree(dirty));
    }

    if !conflicts.is_empty() {
        conflicts.sort();
        log::warn!("merge conflict in {} path(s)", conflicts.len());
        materialize(repo_root, store, &current_index, &merged)?;
        crate::index::write_index(repo_root, &merged)?;
        return Err(GitError::MergeConflict(conflicts));
    }

    let (commit_digest, framed, _) = build_commit(
        root_tree,
        vec![ours, theirs],
        committer.clone(),
        committer,
        format!("Merge branch '{theirs_name}'"),
    );
    store.write(&commit_digest, &framed)?;
    update_ref(repo_root, ours_branch_ref, commit_digest)?;

    materialize(repo_root, store, &current_index, &merged)?;
    crate::index::write_index(repo_root, &merged)?;

    log::info!("merge commit {commit_digest} created");
    Ok(MergeOutcome::Merged {
        commit: commit_digest,
    })
}

fn digests_eq(a: &IndexEntry, b: &IndexEntry) -> bool {
    a.digest == b.digest
}

fn commit_tree(store: &ObjectStore, commit_digest: Digest) -> Result<Digest> {
    let (_, content) = store.read(&commit_digest)?;
    Ok(crate::commit::parse_commit(&content)?.tree)
}

/// Synthesizes the textual conflict blob for a path (§4.11, P13).
fn build_conflict_blob(
    store: &ObjectStore,
    ours: Option<&IndexEntry>,
    theirs: Option<&IndexEntry>,
    theirs_name: &str,
) -> Result<IndexEntry> {
    let ours_bytes = match ours {
        Some(e) => store.read(&e.digest)?.1,
        None => Vec::new(),
    };
    let theirs_bytes = match theirs {
        Some(e) => store.read(&e.digest)?.1,
        None => Vec::new(),
    };

    let mut content = Vec::new();
    content.extend_from_slice(b"<<<<<<< HEAD\n");
    content.extend_from_slice(&ours_bytes);
    if !ours_bytes.ends_with(b"\n") && !ours_bytes.is_empty() {
        content.push(b'\n');
    }
    content.extend_from_slice(b"=======\n");
    content.extend_from_slice(&theirs_bytes);
    if !theirs_bytes.ends_with(b"\n") && !theirs_bytes.is_empty() {
        content.push(b'\n');
    }
    content.extend_from_slice(format!(">>>>>>> {theirs_name}\n").as_bytes());

    let (digest, framed) = crate::digest::hash_framed(ObjectKind::Blob, &content);
    store.write(&digest, &framed)?;
    Ok(IndexEntry {
        digest,
        mode: FileMode::Regular,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::Ident;
    use crate::digest::hash_framed;
    use crate::index::IndexEntry;
    use crate::refs::{resolve_ref, set_head_symbolic};
    use crate::tree::{TreeEntry, build_tree};
    use std::collections::BTreeMap;

    fn ident() -> Ident {
        Ident {
            name: "T".into(),
            email: "t@example.com".into(),
            timestamp: 0,
            tz_offset: "+0000".into(),
        }
    }

    fn commit_single_file(
        store: &ObjectStore,
        parents: Vec<Digest>,
        path: &str,
        content: &[u8],
    ) -> Digest {
        let (blob, blob_framed) = hash_framed(ObjectKind::Blob, content);
        store.write(&blob, &blob_framed).unwrap();
        let (tree, tree_framed) = build_tree(vec![TreeEntry {
            mode: FileMode::Regular,
            name: path.to_string(),
            hash: blob,
        }]);
        store.write(&tree, &tree_framed).unwrap();
        let (commit, commit_framed, _) =
            build_commit(tree, parents, ident(), ident(), "m".into());
        store.write(&commit, &commit_framed).unwrap();
        commit
    }

    #[test]
    fn fast_forward_merge_moves_ref_and_materializes() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        set_head_symbolic(dir.path(), "main").unwrap();

        let c1 = commit_single_file(&store, vec![], "base.txt", b"base");
        update_ref(dir.path(), "refs/heads/main", c1).unwrap();
        crate::index::write_index(dir.path(), &flatten_tree(&store, commit_tree(&store, c1).unwrap()).unwrap()).unwrap();

        let c2 = commit_single_file(&store, vec![c1], "feature.txt", b"feature work");

        let outcome = merge(
            dir.path(),
            &store,
            "refs/heads/main",
            c1,
            c2,
            "feature",
            ident(),
        )
        .unwrap();

        assert_eq!(outcome, MergeOutcome::FastForward { to: c2 });
        assert_eq!(resolve_ref(dir.path(), "refs/heads/main").unwrap(), Some(c2));
        let contents = std::fs::read_to_string(dir.path().join("feature.txt")).unwrap();
        assert_eq!(contents, "feature work");
    }

    #[test]
    fn already_up_to_date_when_equal() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        set_head_symbolic(dir.path(), "main").unwrap();
        let c1 = commit_single_file(&store, vec![], "a.txt", b"a");
        update_ref(dir.path(), "refs/heads/main", c1).unwrap();
        crate::index::write_index(dir.path(), &BTreeMap::new()).unwrap();

        let outcome = merge(dir.path(), &store, "refs/heads/main", c1, c1, "main", ident()).unwrap();
        assert_eq!(outcome, MergeOutcome::AlreadyUpToDate);
    }

    #[test]
    fn three_way_conflict_produces_markers() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        set_head_symbolic(dir.path(), "main").unwrap();

        let base = commit_single_file(&store, vec![], "x.txt", b"A\n");
        let ours = commit_single_file(&store, vec![base], "x.txt", b"B\n");
        let theirs = commit_single_file(&store, vec![base], "x.txt", b"C\n");

        update_ref(dir.path(), "refs/heads/main", ours).unwrap();
        let ours_map = flatten_tree(&store, commit_tree(&store, ours).unwrap()).unwrap();
        crate::index::write_index(dir.path(), &ours_map).unwrap();
        materialize(dir.path(), &store, &BTreeMap::new(), &ours_map).unwrap();

        let err = merge(
            dir.path(),
            &store,
            "refs/heads/main",
            ours,
            theirs,
            "feat",
            ident(),
        )
        .unwrap_err();

        match err {
            GitError::MergeConflict(paths) => assert_eq!(paths, vec!["x.txt".to_string()]),
            other => panic!("expected MergeConflict, got {other:?}"),
        }

        let on_disk = std::fs::read_to_string(dir.path().join("x.txt")).unwrap();
        assert_eq!(on_disk, "<<<<<<< HEAD\nB\n=======\nC\n>>>>>>> feat\n");
    }

    #[test]
    fn three_way_merge_refuses_when_working_tree_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        set_head_symbolic(dir.path(), "main").unwrap();

        let base = commit_single_file(&store, vec![], "x.txt", b"A\n");
        let ours = commit_single_file(&store, vec![base], "y.txt", b"ours\n");
        let theirs = commit_single_file(&store, vec![base], "z.txt", b"theirs\n");

        update_ref(dir.path(), "refs/heads/main", ours).unwrap();
        let ours_map = flatten_tree(&store, commit_tree(&store, ours).unwrap()).unwrap();
        crate::index::write_index(dir.path(), &ours_map).unwrap();
        materialize(dir.path(), &store, &BTreeMap::new(), &ours_map).unwrap();

        // Edit a tracked file on disk without staging it.
        std::fs::write(dir.path().join("y.txt"), "locally edited\n").unwrap();

        let err = merge(
            dir.path(),
            &store,
            "refs/heads/main",
            ours,
            theirs,
            "feat",
            ident(),
        )
        .unwrap_err();

        assert!(matches!(err, GitError::DirtyWorkingTree(_)));
        // The uncommitted edit must survive untouched.
        assert_eq!(
            std::fs::read_to_string(dir.path().join("y.txt")).unwrap(),
            "locally edited\n"
        );
    }

    #[test]
    fn unrelated_histories_fail() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        set_head_symbolic(dir.path(), "main").unwrap();

        let a = commit_single_file(&store, vec![], "a.txt", b"a");
        let b = commit_single_file(&store, vec![], "b.txt", b"b");
        update_ref(dir.path(), "refs/heads/main", a).unwrap();
        crate::index::write_index(dir.path(), &BTreeMap::new()).unwrap();

        let err = merge(dir.path(), &store, "refs/heads/main", a, b, "other", ident()).unwrap_err();
        assert!(matches!(err, GitError::UnrelatedHistories));
    }
}
