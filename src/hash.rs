//! Content hashing for corruption detection.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::common::constants::HASH_CHUNK_BYTES;

/// Hash a file's full contents with BLAKE2b, reading in 128 KiB chunks.
///
/// The digest is only ever compared against another digest produced by this
/// function, so the exact algorithm is not protocol-visible; BLAKE2b is used
/// for its throughput on large targets.
pub fn file_hash(path: &Path) -> io::Result<String> {
    let mut state = blake2b_simd::State::new();
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; HASH_CHUNK_BYTES];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        state.update(&buf[..n]);
    }
    Ok(state.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn identical_contents_hash_identically() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();
        assert_eq!(file_hash(&a).unwrap(), file_hash(&b).unwrap());
    }

    #[test]
    fn single_byte_change_is_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"payload-0").unwrap();
        let before = file_hash(&path).unwrap();
        fs::write(&path, b"payload-1").unwrap();
        assert_ne!(before, file_hash(&path).unwrap());
    }

    #[test]
    fn spans_multiple_chunks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big");
        // Three full chunks plus a tail.
        let data = vec![0xabu8; HASH_CHUNK_BYTES * 3 + 17];
        fs::write(&path, &data).unwrap();
        let whole = file_hash(&path).unwrap();

        let mut state = blake2b_simd::State::new();
        state.update(&data);
        assert_eq!(whole, state.finalize().to_hex().to_string());
    }

    #[test]
    fn empty_file_hashes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, b"").unwrap();
        assert!(!file_hash(&path).unwrap().is_empty());
    }
}
