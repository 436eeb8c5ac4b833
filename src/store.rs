//! Content-addressable object store (§4.3).
//!
//! Layout: `<repo>/objects/<hex[0:2]>/<hex[2:64]>`, each file holding the
//! deflated framed buffer. Writes are staged to a temp file in the same
//! fan-out directory and renamed into place, so a crash leaves either no
//! file or a complete valid one.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::codec::{compress, decompress};
use crate::digest::{Digest, ObjectKind, parse_framed};
use crate::error::{GitError, Result};

pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        ObjectStore {
            root: repo_root.into().join("objects"),
        }
    }

    fn path_for(&self, digest: &Digest) -> PathBuf {
        let (prefix, rest) = digest.fanout();
        self.root.join(prefix).join(rest)
    }

    pub fn exists(&self, digest: &Digest) -> bool {
        self.path_for(digest).is_file()
    }

    /// Writes `framed` under `digest`. A no-op if the target already
    /// exists (the sole deduplication mechanism, P6).
    pub fn write(&self, digest: &Digest, framed: &[u8]) -> Result<()> {
        let target = self.path_for(digest);
        if target.is_file() {
            log::trace!("object {digest} already present, skipping write");
            return Ok(());
        }
        let dir = target
            .parent()
            .expect("object path always has a fan-out parent");
        fs::create_dir_all(dir).map_err(|e| GitError::io_at(dir, e))?;

        let compressed = compress(framed)?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| GitError::io_at(dir, e))?;
        std::io::Write::write_all(&mut tmp, &compressed).map_err(|e| GitError::io_at(dir, e))?;
        tmp.persist(&target)
            .map_err(|e| GitError::io_at(&target, e.error))?;
        log::debug!("wrote object {digest}");
        Ok(())
    }

    /// Reads and decompresses the object at `digest`, returning
    /// `(kind, content)`. `NotFound` if the file is absent; `Corrupted` if
    /// the header is malformed or the declared size doesn't match.
    pub fn read(&self, digest: &Digest) -> Result<(ObjectKind, Vec<u8>)> {
        let path = self.path_for(digest);
        let raw = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitError::NotFound(digest.to_hex())
            } else {
                GitError::io_at(&path, e)
            }
        })?;
        let framed = decompress(&raw)?;
        let (kind, content) = parse_framed(&framed)?;
        Ok((kind, content.to_vec()))
    }

    /// Reads the raw framed buffer (decompressed, header included) rather
    /// than the parsed `(kind, content)` pair. Used by `Object::parse_framed`
    /// callers and round-trip tests (Invariant W1).
    pub fn read_framed(&self, digest: &Digest) -> Result<Vec<u8>> {
        let path = self.path_for(digest);
        let raw = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitError::NotFound(digest.to_hex())
            } else {
                GitError::io_at(&path, e)
            }
        })?;
        decompress(&raw)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
