//! Flat index -> nested tree (§4.8).
//!
//! Partitions index entries by their first path segment: entries with no
//! further `/` become leaves; the rest group by leading segment and recurse
//! on the remaining suffixes, bottom-up, writing each subtree before
//! emitting its `040000` entry in the parent.

use std::collections::BTreeMap;

use crate::digest::Digest;
use crate::error::{GitError, Result};
use crate::index::IndexEntry;
use crate::store::ObjectStore;
use crate::tree::{FileMode, TreeEntry, build_tree};

/// Recursion is bounded by path depth, not DAG depth, but follows the same
/// "convert to an explicit worklist or bound it" guidance in §5.
const MAX_DEPTH: usize = 1000;

/// Builds the root tree from a flat `path -> {digest, mode}` map, writing
/// every subtree (and the root) to `store`, and returns the root digest.
/// Deterministic regardless of map iteration order (Invariant B1) because
/// `BTreeMap` iterates in sorted key order and `build_tree` re-sorts anyway.
pub fn build_tree_from_index(
    store: &ObjectStore,
    entries: &BTreeMap<String, IndexEntry>,
) -> Result<Digest> {
    let grouped = group_by_first_segment(entries);
    build_group(store, &grouped, 0)
}

enum Group<'a> {
    Leaf(&'a IndexEntry),
    Sub(BTreeMap<String, Group<'a>>),
}

fn group_by_first_segment<'a>(
    entries: &'a BTreeMap<String, IndexEntry>,
) -> BTreeMap<String, Group<'a>> {
    let mut root: BTreeMap<String, Group<'a>> = BTreeMap::new();
    for (path, entry) in entries {
        insert_path(&mut root, path, entry);
    }
    root
}

fn insert_path<'a>(node: &mut BTreeMap<String, Group<'a>>, path: &str, entry: &'a IndexEntry) {
    match path.split_once('/') {
        None => {
            node.insert(path.to_string(), Group::Leaf(entry));
        }
        Some((first, rest)) => {
            let sub = node
                .entry(first.to_string())
                .or_insert_with(|| Group::Sub(BTreeMap::new()));
            match sub {
                Group::Sub(map) => insert_path(map, rest, entry),
                Group::Leaf(_) => {
                    // A leaf and a directory can't legally share a name in a
                    // well-formed index; promote to a directory defensively.
                    *sub = Group::Sub(BTreeMap::new());
                    if let Group::Sub(map) = sub {
                        insert_path(map, rest, entry);
                    }
                }
            }
        }
    }
}

fn build_group(
    store: &ObjectStore,
    group: &BTreeMap<String, Group<'_>>,
    depth: usize,
) -> Result<Digest> {
    if depth > MAX_DEPTH {
        return Err(GitError::TooDeep);
    }

    let mut tree_entries = Vec::with_capacity(group.len());
    for (name, child) in group {
        let (mode, hash) = match child {
            Group::Leaf(entry) => (entry.mode, entry.digest),
            Group::Sub(map) => {
                let sub_digest = build_group(store, map, depth + 1)?;
                (FileMode::Directory, sub_digest)
            }
        };
        tree_entries.push(TreeEntry {
            mode,
            name: name.clone(),
            hash,
        });
    }

    let (digest, framed) = build_tree(tree_entries);
    store.write(&digest, &framed)?;
    Ok(digest)
}
