//! History walker: ancestry and merge-base (§4.10).

use std::collections::HashSet;

use crate::digest::Digest;
use crate::error::Result;
use crate::store::ObjectStore;

const MAX_DEPTH: usize = 1000;

fn parents_of(store: &ObjectStore, commit: Digest) -> Result<Vec<Digest>> {
    let (_, content) = store.read(&commit)?;
    let parsed = crate::commit::parse_commit(&content)?;
    Ok(parsed.parents)
}

/// Walks all ancestors of `start` (full DAG, all parents), guarding against
/// cycles with a visited set — a cycle indicates corruption but is simply
/// absorbed here since the object graph is acyclic by construction (§9).
fn all_ancestors(store: &ObjectStore, start: Digest) -> Result<HashSet<Digest>> {
    let mut visited = HashSet::new();
    let mut stack = vec![start];
    let mut depth = 0usize;

    while let Some(commit) = stack.pop() {
        if !visited.insert(commit) {
            continue;
        }
        depth += 1;
        if depth > MAX_DEPTH * MAX_DEPTH {
            return Err(crate::error::GitError::TooDeep);
        }
        for parent in parents_of(store, commit)? {
            if !visited.contains(&parent) {
                stack.push(parent);
            }
        }
    }
    Ok(visited)
}

/// `true` if `a` is an ancestor of (or equal to) `b`. Walks the first-parent
/// chain from `b`, per the Open Question in §9 — sufficient for linear
/// history, under-reports ancestry through merge commits.
pub fn is_ancestor(store: &ObjectStore, a: Digest, b: Digest) -> Result<bool> {
    if a == b {
        return Ok(true);
    }
    let mut current = b;
    let mut visited = HashSet::new();
    let mut depth = 0usize;

    loop {
        if !visited.insert(current) {
            // cycle: object graph should be acyclic by construction
            return Ok(false);
        }
        depth += 1;
        if depth > MAX_DEPTH {
            return Err(crate::error::GitError::TooDeep);
        }
        let parents = parents_of(store, current)?;
        let Some(&first_parent) = parents.first() else {
            return Ok(false);
        };
        if first_parent == a {
            return Ok(true);
        }
        current = first_parent;
    }
}

/// Most recent common ancestor of `a` and `b`, or `None` for unrelated
/// histories (P12).
pub fn merge_base(store: &ObjectStore, a: Digest, b: Digest) -> Result<Option<Digest>> {
    let ancestors_of_a = all_ancestors(store, a)?;
    if ancestors_of_a.contains(&b) {
        return Ok(Some(b));
    }

    let mut stack = vec![b];
    let mut visited = HashSet::new();
    while let Some(commit) = stack.pop() {
        if !visited.insert(commit) {
            continue;
        }
        if ancestors_of_a.contains(&commit) {
            return Ok(Some(commit));
        }
        for parent in parents_of(store, commit)? {
            stack.push(parent);
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::{Ident, build_commit};

    fn commit_at(store: &ObjectStore, tree_seed: u8, parents: Vec<Digest>) -> Digest {
        let tree = Digest::from_bytes([tree_seed; 32]);
        let ident = Ident {
            name: "T".into(),
            email: "t@example.com".into(),
            timestamp: 0,
            tz_offset: "+0000".into(),
        };
        let (digest, framed, _) = build_commit(tree, parents, ident.clone(), ident, "m".into());
        store.write(&digest, &framed).unwrap();
        digest
    }

    #[test]
    fn linear_chain_ancestry() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let c1 = commit_at(&store, 1, vec![]);
        let c2 = commit_at(&store, 2, vec![c1]);
        let c3 = commit_at(&store, 3, vec![c2]);

        assert!(is_ancestor(&store, c1, c3).unwrap());
        assert!(is_ancestor(&store, c1, c1).unwrap());
        assert!(!is_ancestor(&store, c3, c1).unwrap());
    }

    #[test]
    fn merge_base_common_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let root = commit_at(&store, 1, vec![]);
        let left = commit_at(&store, 2, vec![root]);
        let right = commit_at(&store, 3, vec![root]);

        let base = merge_base(&store, left, right).unwrap();
        assert_eq!(base, Some(root));
    }

    #[test]
    fn merge_base_none_for_unrelated() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let a = commit_at(&store, 1, vec![]);
        let b = commit_at(&store, 2, vec![]);

        assert_eq!(merge_base(&store, a, b).unwrap(), None);
    }

    #[test]
    fn merge_base_ancestor_of_both() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectStore::new(dir.path());
        let root = commit_at(&store, 1, vec![]);
        let mid = commit_at(&store, 2, vec![root]);
        let left = commit_at(&store, 3, vec![mid]);
        let right = commit_at(&store, 4, vec![mid]);

        let base = merge_base(&store, left, right).unwrap().unwrap();
        assert!(is_ancestor(&store, base, left).unwrap());
        assert!(is_ancestor(&store, base, right).unwrap());
    }
}
