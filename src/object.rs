//! The shared object model: a tagged variant over the three object kinds,
//! per the "Polymorphic objects" design note in §9. Blob/Tree/Commit share
//! only the framed-envelope representation; this type gives callers one
//! `hash_framed()`/`parse_framed()` surface plus `as_blob()`/`as_tree()`
//! accessors, while `tree`/`commit` own their own structured build/parse.

use crate::commit::{Commit, build_commit, parse_commit};
use crate::digest::{Digest, ObjectKind, hash_framed, parse_framed};
use crate::error::{GitError, Result};
use crate::tree::{TreeEntry, build_tree, parse_tree};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Object {
    Blob(Vec<u8>),
    Tree(Vec<TreeEntry>),
    Commit(Commit),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Blob(_) => ObjectKind::Blob,
            Object::Tree(_) => ObjectKind::Tree,
            Object::Commit(_) => ObjectKind::Commit,
        }
    }

    /// Frames and hashes this object, returning `(digest, framed_bytes)`
    /// ready to hand to the store.
    pub fn hash_framed(&self) -> (Digest, Vec<u8>) {
        match self {
            Object::Blob(bytes) => hash_framed(ObjectKind::Blob, bytes),
            Object::Tree(entries) => build_tree(entries.clone()),
            Object::Commit(commit) => {
                let (digest, framed, _) = build_commit(
                    commit.tree,
                    commit.parents.clone(),
                    commit.author.clone(),
                    commit.committer.clone(),
                    commit.message.clone(),
                );
                (digest, framed)
            }
        }
    }

    /// Parses a full framed object buffer (header included) into its
    /// tagged variant.
    pub fn parse_framed(framed: &[u8]) -> Result<Self> {
        let (kind, content) = parse_framed(framed)?;
        match kind {
            ObjectKind::Blob => Ok(Object::Blob(content.to_vec())),
            ObjectKind::Tree => Ok(Object::Tree(parse_tree(content)?)),
            ObjectKind::Commit => Ok(Object::Commit(parse_commit(content)?)),
        }
    }

    pub fn as_blob(&self) -> Result<&[u8]> {
        match self {
            Object::Blob(bytes) => Ok(bytes),
            other => Err(GitError::Corrupted(format!(
                "expected blob, got {}",
                other.kind().as_str()
            ))),
        }
    }

    pub fn as_tree(&self) -> Result<&[TreeEntry]> {
        match self {
            Object::Tree(entries) => Ok(entries),
            other => Err(GitError::Corrupted(format!(
                "expected tree, got {}",
                other.kind().as_str()
            ))),
        }
    }
}
