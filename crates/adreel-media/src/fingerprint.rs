//! Content fingerprints used as cache keys.

use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

use crate::error::MediaResult;

const READ_CHUNK: usize = 64 * 1024;

/// Hex SHA-256 of a file's contents.
pub async fn fingerprint_file(path: impl AsRef<Path>) -> MediaResult<String> {
    let mut file = tokio::fs::File::open(path.as_ref()).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hex SHA-256 of an in-memory buffer.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_and_bytes_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.bin");
        let data = vec![7u8; READ_CHUNK * 2 + 17];
        tokio::fs::write(&path, &data).await.unwrap();

        let from_file = fingerprint_file(&path).await.unwrap();
        assert_eq!(from_file, fingerprint_bytes(&data));
        assert_eq!(from_file.len(), 64);
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            fingerprint_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
