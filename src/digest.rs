//! Content digests and the framed-object envelope (§3, §4.1 of the spec).
//!
//! Every stored object is hashed and addressed by the digest of its framed
//! form: `"<type> <size>\0<content>"`. This module owns the digest type and
//! the pure `hash_framed` function; it knows nothing about compression or
//! disk layout — those are `codec` and `store`.

use sha2::{Digest as _, Sha256};

use crate::error::{GitError, Result};

/// A 32-byte SHA-256 digest, the address of every object in the store.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    pub const LEN: usize = 32;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Digest(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|_| GitError::InvalidRef(s.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| GitError::InvalidRef(s.to_string()))?;
        Ok(Digest(arr))
    }

    /// The two-char fan-out directory and the remaining 62 hex chars, per
    /// the `objects/<xx>/<rest>` layout in §4.3.
    pub fn fanout(&self) -> (String, String) {
        let hex = self.to_hex();
        (hex[..2].to_string(), hex[2..].to_string())
    }
}

impl std::fmt::Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// The three object kinds that may appear as the `TYPE` token of a framed
/// object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            "commit" => Ok(ObjectKind::Commit),
            other => Err(GitError::Corrupted(format!("unknown object kind: {other}"))),
        }
    }
}

/// Frames `content` as `"<type> <byte-len>\0<content>"` and returns both the
/// digest of the framed buffer and the buffer itself, so the caller can
/// write it to the object store without re-hashing (Invariant H1, P2, P3).
pub fn hash_framed(kind: ObjectKind, content: &[u8]) -> (Digest, Vec<u8>) {
    let mut framed = Vec::with_capacity(content.len() + 16);
    framed.extend_from_slice(kind.as_str().as_bytes());
    framed.push(b' ');
    framed.extend_from_slice(content.len().to_string().as_bytes());
    framed.push(0);
    framed.extend_from_slice(content);

    let mut hasher = Sha256::new();
    hasher.update(&framed);
    let digest = Digest(hasher.finalize().into());

    (digest, framed)
}

/// Splits a framed buffer back into `(kind, content)`. Fails `Corrupted` if
/// there is no NUL, the header is malformed, or the declared size does not
/// match the actual content length.
pub fn parse_framed(framed: &[u8]) -> Result<(ObjectKind, &[u8])> {
    let nul = framed
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| GitError::Corrupted("missing header terminator".into()))?;
    let header = std::str::from_utf8(&framed[..nul])
        .map_err(|_| GitError::Corrupted("header is not valid UTF-8".into()))?;
    let (kind_s, size_s) = header
        .split_once(' ')
        .ok_or_else(|| GitError::Corrupted("malformed header".into()))?;
    let kind = ObjectKind::parse(kind_s)?;
    let size: usize = size_s
        .parse()
        .map_err(|_| GitError::Corrupted("object size isn't a number".into()))?;
    let content = &framed[nul + 1..];
    if content.len() != size {
        return Err(GitError::Corrupted(format!(
            "size mismatch: header says {size}, got {}",
            content.len()
        )));
    }
    Ok((kind, content))
}
