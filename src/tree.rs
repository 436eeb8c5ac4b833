//! Tree object build & parse (§4.4).
//!
//! A tree is an ordered sequence of `{mode, name, hash}` entries. Invariant
//! T1 requires entries to be serialized sorted ascending by name under
//! byte-wise ordering, regardless of the order the caller supplies them in.

use crate::digest::{Digest, ObjectKind, hash_framed, parse_framed};
use crate::error::{GitError, Result};

/// File mode recorded in a tree entry. `100755` is defined by the spec but,
/// per the Open Question in §9, preserving and restoring the executable bit
/// is left to the working-tree layer — this type just carries the value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileMode {
    Regular,
    Executable,
    Directory,
}

impl FileMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileMode::Regular => "100644",
            FileMode::Executable => "100755",
            FileMode::Directory => "040000",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "100644" => Ok(FileMode::Regular),
            "100755" => Ok(FileMode::Executable),
            "040000" => Ok(FileMode::Directory),
            other => Err(GitError::Corrupted(format!("unknown tree entry mode: {other}"))),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, FileMode::Directory)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: FileMode,
    pub name: String,
    pub hash: Digest,
}

/// Sorts `entries` by name (byte-wise) and serializes + stores them,
/// returning the root digest. Invariant T1/T2, properties P7/P8.
pub fn build_tree(mut entries: Vec<TreeEntry>) -> (Digest, Vec<u8>) {
    entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

    let mut content = Vec::new();
    for entry in &entries {
        content.extend_from_slice(entry.mode.as_str().as_bytes());
        content.push(b' ');
        content.extend_from_slice(entry.name.as_bytes());
        content.push(0);
        content.extend_from_slice(entry.hash.as_bytes());
    }

    let (digest, framed) = hash_framed(ObjectKind::Tree, &content);
    (digest, framed)
}

/// Parses tree content (the bytes after the framed header) into entries,
/// already in the canonical sorted order they were serialized in.
pub fn parse_tree(content: &[u8]) -> Result<Vec<TreeEntry>> {
    let mut entries = Vec::new();
    let mut offset = 0usize;

    while offset < content.len() {
        let sp = content[offset..]
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| GitError::Corrupted("tree entry missing mode separator".into()))?;
        let mode_str = std::str::from_utf8(&content[offset..offset + sp])
            .map_err(|_| GitError::Corrupted("tree entry mode is not valid UTF-8".into()))?;
        let mode = FileMode::parse(mode_str)?;
        offset += sp + 1;

        let nul = content[offset..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| GitError::Corrupted("tree entry missing name terminator".into()))?;
        let name = std::str::from_utf8(&content[offset..offset + nul])
            .map_err(|_| GitError::Corrupted("tree entry name is not valid UTF-8".into()))?
            .to_string();
        offset += nul + 1;

        if offset + Digest::LEN > content.len() {
            return Err(GitError::Corrupted("tree entry truncated mid-hash".into()));
        }
        let mut hash_bytes = [0u8; 32];
        hash_bytes.copy_from_slice(&content[offset..offset + Digest::LEN]);
        offset += Digest::LEN;

        entries.push(TreeEntry {
            mode,
            name,
            hash: Digest::from_bytes(hash_bytes),
        });
    }

    Ok(entries)
}

/// Parses a full framed tree object (header included).
pub fn parse_tree_framed(framed: &[u8]) -> Result<Vec<TreeEntry>> {
    let (kind, content) = parse_framed(framed)?;
    if kind != ObjectKind::Tree {
        return Err(GitError::Corrupted(format!(
            "expected tree object, got {}",
            kind.as_str()
        )));
    }
    parse_tree(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(mode: FileMode, name: &str, seed: u8) -> TreeEntry {
        let hash = Digest::from_bytes([seed; 32]);
        TreeEntry {
            mode,
            name: name.to_string(),
            hash,
        }
    }

    #[test]
    fn canonical_order_independent_of_input_order() {
        let a = entry(FileMode::Regular, "a.js", 1);
        let b = entry(FileMode::Regular, "b.js", 2);

        let (d1, _) = build_tree(vec![b.clone(), a.clone()]);
        let (d2, _) = build_tree(vec![a, b]);
        assert_eq!(d1, d2);
    }

    #[test]
    fn round_trip_sorted_by_name() {
        let a = entry(FileMode::Regular, "a.js", 1);
        let b = entry(FileMode::Regular, "b.js", 2);
        let (_, framed) = build_tree(vec![b.clone(), a.clone()]);

        let parsed = parse_tree_framed(&framed).unwrap();
        assert_eq!(parsed, vec![a, b]);
    }

    #[test]
    fn empty_tree_is_legal() {
        let (_digest, framed) = build_tree(vec![]);
        let parsed = parse_tree_framed(&framed).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn truncated_entry_is_corrupted() {
        let mut framed = b"tree 10\0100644 a.js\0".to_vec();
        framed.truncate(framed.len() - 2); // drop two hash bytes, total shorter than 32
        let err = parse_tree_framed(&framed).unwrap_err();
        assert!(matches!(err, GitError::Corrupted(_)));
    }
}
