//! Byte-level (de)compression for the object store (§4.2).
//!
//! The store keeps every object whole (no delta/pack compression, per the
//! Non-goals in §1) but deflates the framed buffer on disk. This is the only
//! place `flate2` is used directly.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::{GitError, Result};

pub fn compress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).map_err(GitError::io)?;
    encoder.finish().map_err(GitError::io)
}

pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| GitError::Corrupted(format!("zlib decompress failed: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_empty() {
        let compressed = compress(b"").unwrap();
        assert_eq!(decompress(&compressed).unwrap(), b"");
    }

    #[test]
    fn round_trip_arbitrary_bytes() {
        let data: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let compressed = compress(&data).unwrap();
        assert_eq!(decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn decompress_garbage_is_corrupted() {
        let err = decompress(b"not zlib data at all").unwrap_err();
        assert!(matches!(err, GitError::Corrupted(_)));
    }
}
