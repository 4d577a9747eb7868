//! Streaming SHA-256 of on-disk assets

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use kiosk_core::KioskResult;

/// Read size while hashing; assets are never loaded whole
pub const DIGEST_CHUNK_SIZE: usize = 64 * 1024;

/// Lower-case hex SHA-256 of a file, read in fixed-size chunks
pub async fn sha256_file(path: &Path) -> KioskResult<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; DIGEST_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Lower-case hex SHA-256 of an in-memory buffer
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_known_vectors() {
        assert_eq!(sha256_hex(b""), EMPTY);
        assert_eq!(
            sha256_hex(b"test"),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[tokio::test]
    async fn test_file_digest_spans_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asset.bin");
        let data: Vec<u8> = (0..(DIGEST_CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        assert_eq!(sha256_file(&path).await.unwrap(), sha256_hex(&data));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = sha256_file(Path::new("/nonexistent/asset.bin")).await.unwrap_err();
        assert_eq!(err.kind(), kiosk_core::ErrorKind::TransientIo);
    }
}
