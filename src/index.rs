//! The staging area: a flat `path -> {digest, mode}` map (§4.6).
//!
//! Persistence format is implementation-defined per the spec's Open
//! Question; this crate uses a stable, human-inspectable text format (one
//! line per entry: `<mode> <hex-digest> <path>\n`, sorted by path), in
//! keeping with the rest of the engine's preference for plain ASCII framing
//! over a binary or serde-encoded index.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::digest::Digest;
use crate::error::{GitError, Result};
use crate::lock::{LockGuard, index_lock_path};
use crate::tree::FileMode;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub digest: Digest,
    pub mode: FileMode,
}

/// Normalizes a path to forward-slash form with no leading slash and no
/// `.`/`..` segments, per §3's Index contract.
pub fn normalize_path(path: &str) -> Result<String> {
    let normalized = path.replace('\\', "/");
    let normalized = normalized.trim_start_matches('/');
    let mut segments = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(GitError::InvalidRef(path.to_string())),
            other => segments.push(other),
        }
    }
    Ok(segments.join("/"))
}

pub fn read_index(repo_root: &Path) -> Result<BTreeMap<String, IndexEntry>> {
    let path = repo_root.join("index");
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(GitError::io_at(&path, e)),
    };

    let mut map = BTreeMap::new();
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(3, ' ');
        let mode_s = parts
            .next()
            .ok_or_else(|| GitError::Corrupted("index line missing mode".into()))?;
        let hash_s = parts
            .next()
            .ok_or_else(|| GitError::Corrupted("index line missing digest".into()))?;
        let path_s = parts
            .next()
            .ok_or_else(|| GitError::Corrupted("index line missing path".into()))?;

        let mode = FileMode::parse(mode_s)?;
        let digest = Digest::from_hex(hash_s)?;
        map.insert(
            path_s.to_string(),
            IndexEntry { digest, mode },
        );
    }
    Ok(map)
}

pub fn write_index(repo_root: &Path, map: &BTreeMap<String, IndexEntry>) -> Result<()> {
    let _guard = LockGuard::acquire(index_lock_path(repo_root))?;
    let mut text = String::new();
    for (path, entry) in map {
        text.push_str(entry.mode.as_str());
        text.push(' ');
        text.push_str(&entry.digest.to_hex());
        text.push(' ');
        text.push_str(path);
        text.push('\n');
    }
    let index_path = repo_root.join("index");
    fs::write(&index_path, text).map_err(|e| GitError::io_at(&index_path, e))?;
    log::debug!("wrote index with {} entries", map.len());
    Ok(())
}

pub fn add_entry(
    repo_root: &Path,
    path: &str,
    digest: Digest,
    mode: FileMode,
) -> Result<()> {
    let normalized = normalize_path(path)?;
    let mut map = read_index(repo_root)?;
    map.insert(normalized, IndexEntry { digest, mode });
    write_index(repo_root, &map)
}

pub fn remove_entry(repo_root: &Path, path: &str) -> Result<()> {
    let normalized = normalize_path(path)?;
    let mut map = read_index(repo_root)?;
    map.remove(&normalized);
    write_index(repo_root, &map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_index_file_is_empty_map() {
        let dir = tempfile::tempdir().unwrap();
        let map = read_index(dir.path()).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn add_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let digest = Digest::from_bytes([7; 32]);
        add_entry(dir.path(), "src/main.rs", digest, FileMode::Regular).unwrap();

        let map = read_index(dir.path()).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["src/main.rs"].digest, digest);
    }

    #[test]
    fn remove_entry_drops_key() {
        let dir = tempfile::tempdir().unwrap();
        let digest = Digest::from_bytes([8; 32]);
        add_entry(dir.path(), "a.txt", digest, FileMode::Regular).unwrap();
        remove_entry(dir.path(), "a.txt").unwrap();

        let map = read_index(dir.path()).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn normalize_rejects_dotdot() {
        assert!(normalize_path("../escape").is_err());
    }

    #[test]
    fn normalize_strips_leading_slash_and_dot_segments() {
        assert_eq!(normalize_path("/a/./b").unwrap(), "a/b");
    }

    #[test]
    fn dedup_same_content_different_paths() {
        let dir = tempfile::tempdir().unwrap();
        let digest = Digest::from_bytes([9; 32]);
        add_entry(dir.path(), "a.txt", digest, FileMode::Regular).unwrap();
        add_entry(dir.path(), "b.txt", digest, FileMode::Regular).unwrap();

        let map = read_index(dir.path()).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a.txt"].digest, map["b.txt"].digest);
    }
}
